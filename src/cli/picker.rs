//! Interactive image chooser.
//!
//! Used when an image subcommand is run without a path: lists the detector
//! images (`*.tif`, `*.tiff`) under the current directory and reads a choice
//! from stdin, either a number from the list or an explicit path. `q` cancels.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SasError};

/// Directory recursion depth when looking for images.
const DEFAULT_SEARCH_DEPTH: usize = 2;

const IMAGE_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

/// Prompt for an image from the current directory tree.
pub fn prompt_for_image_path() -> Result<PathBuf> {
    let files = discover_images();
    if files.is_empty() {
        return Err(SasError::config("no .tif/.tiff files found; pass the image path explicitly"));
    }
    let stdin = io::stdin();
    let stdout = io::stdout();
    choose(&files, &mut stdin.lock(), &mut stdout.lock())
}

fn choose(files: &[PathBuf], input: &mut impl BufRead, out: &mut impl Write) -> Result<PathBuf> {
    writeln!(out, "Found {} image(s):", files.len())?;
    for (idx, path) in files.iter().enumerate() {
        writeln!(out, "{:>3}) {}", idx + 1, pretty_path(path))?;
    }

    loop {
        write!(out, "Select an image by number (1-{}) or type a path (q to quit): ", files.len())?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(SasError::config("no input received; pass the image path explicitly"));
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Err(SasError::config("canceled"));
        }

        if let Ok(choice) = line.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return validate_image_path(&files[choice - 1]);
            }
            writeln!(out, "Invalid choice: {choice}. Enter a number between 1 and {}.", files.len())?;
            continue;
        }

        match validate_image_path(Path::new(line)) {
            Ok(path) => return Ok(path),
            Err(err) => writeln!(out, "{err}")?,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// The path must be an existing `.tif`/`.tiff` file.
pub fn validate_image_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(SasError::config(format!("image not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(SasError::config(format!("expected a file, got a directory: {}", path.display())));
    }
    if !is_image(path) {
        return Err(SasError::config(format!("expected a .tif or .tiff file, got {}", path.display())));
    }
    Ok(path.to_path_buf())
}

/// Images under the current directory, sorted by path.
pub fn discover_images() -> Vec<PathBuf> {
    find_images(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_images(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_images_inner(root, 0, max_depth, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn find_images_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else { continue };
        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                find_images_inner(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && is_image(&path) {
            out.push(path);
        }
    }
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

fn pretty_path(path: &Path) -> String {
    path.strip_prefix("./").unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sas-picker-{name}-{}", std::process::id()));
        fs::create_dir_all(dir.join("sub")).unwrap();
        for f in ["b.tif", "a.TIFF", "notes.txt", "sub/c.tif"] {
            fs::write(dir.join(f), b"").unwrap();
        }
        dir
    }

    #[test]
    fn finds_tiff_files_only() {
        let dir = scratch("find");
        let names: Vec<String> = find_images(&dir, 2)
            .iter()
            .map(|p| p.strip_prefix(&dir).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.TIFF", "b.tif", format!("sub{}c.tif", std::path::MAIN_SEPARATOR).as_str()]);
        assert!(find_images(&dir, 0).iter().all(|p| p.parent() == Some(dir.as_path())));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn choice_by_number_or_path() {
        let dir = scratch("choose");
        let files = find_images(&dir, 0);
        let mut out = Vec::new();
        let picked = choose(&files, &mut "7\n2\n".as_bytes(), &mut out).unwrap();
        assert_eq!(picked, files[1]);
        assert!(String::from_utf8(out).unwrap().contains("Invalid choice: 7"));

        let typed = format!("{}\n", dir.join("notes.txt").display());
        let input = format!("{typed}{}\n", dir.join("b.tif").display());
        let picked = choose(&files, &mut input.as_bytes(), &mut Vec::new()).unwrap();
        assert!(picked.ends_with("b.tif"));

        assert!(choose(&files, &mut "q\n".as_bytes(), &mut Vec::new()).is_err());
        assert!(choose(&files, &mut "".as_bytes(), &mut Vec::new()).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
