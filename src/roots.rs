use std::path::Path;

use crate::error::Result;

/// Launcher mode words that are never treated as paths
pub const RESERVED_TOKENS: &[&str] = &["dev", "start"];

/// Turn command-line arguments into the ordered list of root paths
///
/// Reserved tokens and empty strings are skipped, relative paths are made
/// absolute against the current directory and duplicates are dropped.
pub fn root_paths_from_args<I, S>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut paths: Vec<String> = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        if arg.is_empty() || RESERVED_TOKENS.contains(&arg) {
            continue;
        }

        let absolute = std::path::absolute(Path::new(arg))?
            .to_string_lossy()
            .into_owned();
        if !paths.contains(&absolute) {
            paths.push(absolute);
        }
    }

    Ok(paths)
}
