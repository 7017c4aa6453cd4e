use crossbeam_channel::Receiver;
use std::path::Path;
use walkdir::WalkDir;

use crate::ItemRecord;

const IMAGE_EXTS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Walk `root` and collect image items, natural-sorted by file name so
/// img_2 precedes img_10.
pub fn scan_directory(root: &Path, thumbnails_enabled: bool) -> Vec<ItemRecord> {
    let mut items: Vec<ItemRecord> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_image_file(e.path()))
        .map(|e| {
            let display_name = e.file_name().to_string_lossy().into_owned();
            ItemRecord {
                display_name,
                resolved_path: Some(e.path().to_path_buf()),
                thumbnails_enabled,
            }
        })
        .collect();

    items.sort_by(|a, b| natord::compare(&a.display_name, &b.display_name));
    items
}

/// Scan on a background thread so a large library never blocks the UI;
/// the single result lands on the returned channel.
pub fn spawn_scan(root: std::path::PathBuf, thumbnails_enabled: bool) -> Receiver<Vec<ItemRecord>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let items = scan_directory(&root, thumbnails_enabled);
        eprintln!("picalog: scanned {} images under {}", items.len(), root.display());
        let _ = tx.send(items);
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("picalog_catalog_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_is_image_file_extensions() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("a.JPEG")));
        assert!(is_image_file(Path::new("a.webp")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn test_scan_natural_sort_and_filtering() {
        let dir = temp_dir("sort");
        touch(&dir, "img_10.jpg");
        touch(&dir, "img_2.jpg");
        touch(&dir, "notes.txt");
        touch(&dir, "img_1.png");

        let items = scan_directory(&dir, true);
        let names: Vec<&str> = items.iter().map(|i| i.display_name.as_str()).collect();
        assert_eq!(names, vec!["img_1.png", "img_2.jpg", "img_10.jpg"]);
        assert!(items.iter().all(|i| i.thumbnails_enabled));
        assert!(items.iter().all(|i| i.resolved_path.is_some()));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_spawn_scan_delivers_on_channel() {
        let dir = temp_dir("spawn");
        touch(&dir, "a.jpg");

        let rx = spawn_scan(dir.clone(), false);
        let items = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].thumbnails_enabled);

        let _ = fs::remove_dir_all(&dir);
    }
}
