//! Storage path and slug construction. Every object path starts with the
//! owning account id so ownership is visible in the path itself.

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

const SLUG_SUFFIX_LEN: usize = 6;
const SLUG_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Reduce an arbitrary client file name to lowercase ASCII with `-` runs,
/// preserving the extension.
pub fn sanitize_file_name(name: &str) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, Some(e)),
        _ => (name, None),
    };

    let clean = |part: &str| -> String {
        let mut out = String::with_capacity(part.len());
        let mut last_dash = true;
        for c in part.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
                last_dash = false;
            } else if !last_dash {
                out.push('-');
                last_dash = true;
            }
        }
        out.trim_matches('-').to_string()
    };

    let stem = clean(stem);
    let stem = if stem.is_empty() { "file".to_string() } else { stem };
    match ext {
        Some(e) => {
            let e = clean(e);
            if e.is_empty() {
                stem
            } else {
                format!("{}.{}", stem, e)
            }
        }
        None => stem,
    }
}

/// Private-bucket path for a project entry photo.
pub fn entry_media_path(owner_id: &str, project_id: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        owner_id,
        project_id,
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

/// Private-bucket paths for a before/after pair. Both sides share one
/// folder so they live and die together; the uuid keeps back-to-back
/// publishes in the same millisecond apart.
pub fn pair_media_paths(owner_id: &str, before_name: &str, after_name: &str) -> (String, String) {
    let folder = format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4());
    (
        format!(
            "{}/{}/before-{}",
            owner_id,
            folder,
            sanitize_file_name(before_name)
        ),
        format!(
            "{}/{}/after-{}",
            owner_id,
            folder,
            sanitize_file_name(after_name)
        ),
    )
}

/// Public-bucket path for a republished share image. The random component
/// keeps repeated shares of the same entry from colliding.
pub fn public_share_path(owner_id: &str, entry_id: &str, extension: &str) -> String {
    format!(
        "{}/{}-{}.{}",
        owner_id,
        entry_id,
        random_suffix(8),
        extension.trim_start_matches('.')
    )
}

/// URL-safe slug from a caption, or a generic stem when the caption has
/// nothing usable.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let out = out.trim_matches('-').to_string();
    if out.is_empty() {
        "share".to_string()
    } else {
        out
    }
}

/// Fresh slug candidate: caption stem plus a short random suffix. Callers
/// retry once with a new candidate on a uniqueness conflict.
pub fn new_slug(caption: Option<&str>) -> String {
    let stem = slugify(caption.unwrap_or(""));
    format!("{}-{}", stem, random_suffix(SLUG_SUFFIX_LEN))
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SLUG_CHARS[rng.gen_range(0..SLUG_CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_handles_messy_names() {
        assert_eq!(sanitize_file_name("My Photo (1).JPG"), "my-photo-1.jpg");
        assert_eq!(sanitize_file_name("..."), "file");
        assert_eq!(sanitize_file_name("noext"), "noext");
        assert_eq!(sanitize_file_name("über käse.png"), "ber-k-se.png");
    }

    #[test]
    fn entry_path_starts_with_owner() {
        let path = entry_media_path("user-1", "proj-9", "Kitchen.jpg");
        assert!(path.starts_with("user-1/proj-9/"));
        assert!(path.ends_with("-kitchen.jpg"));
    }

    #[test]
    fn pair_paths_share_a_folder() {
        let (before, after) = pair_media_paths("user-1", "b.png", "a.png");
        assert!(before.starts_with("user-1/"));
        let before_dir = before.rsplit_once('/').unwrap().0;
        let after_dir = after.rsplit_once('/').unwrap().0;
        assert_eq!(before_dir, after_dir);
        assert!(before.contains("/before-"));
        assert!(after.contains("/after-"));
    }

    #[test]
    fn pair_paths_are_unique_per_call() {
        let (first, _) = pair_media_paths("user-1", "b.png", "a.png");
        let (second, _) = pair_media_paths("user-1", "b.png", "a.png");
        assert_ne!(first, second);
    }

    #[test]
    fn share_paths_do_not_collide() {
        let a = public_share_path("user-1", "entry-1", "jpg");
        let b = public_share_path("user-1", "entry-1", "jpg");
        assert!(a.starts_with("user-1/entry-1-"));
        assert_ne!(a, b);
    }

    #[test]
    fn slug_shape() {
        let slug = new_slug(Some("My Kitchen Redo!"));
        assert!(slug.starts_with("my-kitchen-redo-"));
        assert_eq!(slug.rsplit('-').next().unwrap().len(), 6);

        let fallback = new_slug(None);
        assert!(fallback.starts_with("share-"));
    }
}
