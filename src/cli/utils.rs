use camino::Utf8Path;
use simple_error::{SimpleResult, bail};

/// Check a required input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_required_filename(filename: &str, label: &str) -> SimpleResult<()> {
    if filename.is_empty() {
        bail!("Must specify {label} file");
    }
    let path = std::path::Path::new(&filename);
    if !path.exists() {
        bail!("Can't find specified {label} file: '{filename}'");
    }
    if !path.is_file() {
        bail!("Specified {label} file path does not appear to be a file: '{filename}'");
    }
    Ok(())
}

/// Checks if a directory does not exist
///
pub fn check_novel_dirname(dirname: &Utf8Path, label: &str) -> SimpleResult<()> {
    if dirname.exists() {
        bail!("{label} already exists: \"{dirname}\"");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_required_filename() {
        assert!(check_required_filename("Cargo.toml", "test").is_ok());
        assert!(check_required_filename("", "test").is_err());
        assert!(check_required_filename("src", "test").is_err());
        assert!(check_required_filename("no_such_file.tsv", "test").is_err());
    }

    #[test]
    fn test_check_novel_dirname() {
        assert!(check_novel_dirname(Utf8Path::new("src"), "Output directory").is_err());
        assert!(check_novel_dirname(Utf8Path::new("no_such_dir"), "Output directory").is_ok());
    }
}
