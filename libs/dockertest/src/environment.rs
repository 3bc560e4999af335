// Detect whether the tests themselves run inside a container
use std::path::Path;

/// Files whose presence marks a containerized environment
pub const CONTAINER_MARKERS: [&str; 2] = ["/.dockerenv", "/bin/running-in-container"];

pub fn is_inside_container() -> bool {
    any_exists(&CONTAINER_MARKERS)
}

fn any_exists<P: AsRef<Path>>(paths: &[P]) -> bool {
    paths.iter().any(|path| path.as_ref().exists())
}
