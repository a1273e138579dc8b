//! Label list loading.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

/// Load the newline-delimited label list; line index = model output index.
/// Lines are returned without their terminator, including a trailing `\r`.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("failed to read [{}]", path.display()))?;
    let reader = BufReader::new(file);

    let mut labels = Vec::new();
    for line in reader.lines() {
        let mut line =
            line.with_context(|| format!("failed to read [{}]", path.display()))?;
        if line.ends_with('\r') {
            line.pop();
        }
        labels.push(line);
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_lines_verbatim_without_terminators() {
        let lines = ["kit fox", "English setter", "Siberian husky"];
        let path = write_temp("labels-lf", &format!("{}\n", lines.join("\n")));
        let labels = load_labels(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(labels.len(), lines.len());
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(&labels[i], line);
        }
    }

    #[test]
    fn strips_carriage_returns_from_crlf_files() {
        let path = write_temp("labels-crlf", "magpie\r\nhen\r\n");
        let labels = load_labels(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(labels, vec!["magpie", "hen"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("labels-that-do-not-exist.txt");
        let err = load_labels(&path).unwrap_err();
        assert!(err.to_string().contains("failed to read"), "{err:?}");
    }
}
