const IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic", "heif", "svg", "ico", "dng", "cr2", "nef"];

const VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "m4v", "mov", "avi", "wmv", "mkv", "flv", "webm", "mpg", "mpeg", "3gp", "mts", "m2ts", "ts"];

const ALREADY_COMPRESSED_EXTENSIONS: &[&str] = &[
    "xz", "gz", "gzip", "tgz", "bz2", "tbz", "tbz2", "zip", "rar", "zst", "lz", "lzma", "7z", "parquet", "vmdk",
    "ipa", "ipsw", "deb", "pkg", "dmg", "pdf", "pack", "keras", "so", "cfs", "mem", "db",
];

/// A file the state store knows about that's large enough and not already
/// compressed, so it's worth a second look before running `xz` over it.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub bucket: String,
    pub key: String,
    pub size: i64,
}

/// Splits a key's final path component on `.` into lowercase suffix tokens
/// (`"photo.tar.gz"` -> `["tar", "gz"]`), ignoring a leading dotfile name.
pub fn suffix_tokens(key: &str) -> Vec<String> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let trimmed = file_name.trim_start_matches('.');
    trimmed.split('.').skip(1).map(|s| s.to_lowercase()).collect()
}

/// True if any of the key's suffix tokens indicate it's already compressed,
/// an image, a video, or a numbered part — none of which benefit from an
/// extra `xz` pass. Checks every token, not just the final one, since a
/// compressed or numbered suffix can sit ahead of further extensions
/// (`dataset.parquet.crc`, `song.mp3`, `firmware.v1`).
pub fn should_skip_by_suffix(key: &str) -> bool {
    suffix_tokens(key).iter().any(|token| {
        ALREADY_COMPRESSED_EXTENSIONS.contains(&token.as_str())
            || IMAGE_EXTENSIONS.contains(&token.as_str())
            || VIDEO_EXTENSIONS.contains(&token.as_str())
            || token.chars().next_back().is_some_and(|c| c.is_ascii_digit())
    })
}

/// Parses a human size like `500M` or `2G` into bytes. Accepts a bare
/// number (bytes) when no suffix is given.
pub fn parse_size(input: &str) -> Option<i64> {
    let input = input.trim();
    let (number, multiplier) = match input.chars().last() {
        Some('K') | Some('k') => (&input[..input.len() - 1], 1024i64),
        Some('M') | Some('m') => (&input[..input.len() - 1], 1024i64 * 1024),
        Some('G') | Some('g') => (&input[..input.len() - 1], 1024i64 * 1024 * 1024),
        Some('T') | Some('t') => (&input[..input.len() - 1], 1024i64 * 1024 * 1024 * 1024),
        _ => (input, 1),
    };
    number.trim().parse::<i64>().ok().map(|n| n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_tokens_splits_compound_extensions() {
        assert_eq!(suffix_tokens("archive.tar.gz"), vec!["tar".to_string(), "gz".to_string()]);
        assert_eq!(suffix_tokens("photo.JPG"), vec!["jpg".to_string()]);
    }

    #[test]
    fn already_compressed_and_media_extensions_are_skipped() {
        assert!(should_skip_by_suffix("backup.tar.gz"));
        assert!(should_skip_by_suffix("photo.jpg"));
        assert!(should_skip_by_suffix("clip.mp4"));
        assert!(!should_skip_by_suffix("data.csv"));
    }

    #[test]
    fn numeric_suffix_is_treated_as_archive_part() {
        assert!(should_skip_by_suffix("backup.tar.001"));
    }

    #[test]
    fn non_final_token_still_triggers_skip() {
        assert!(should_skip_by_suffix("dataset.parquet.crc"));
        assert!(should_skip_by_suffix("song.mp3"));
        assert!(should_skip_by_suffix("firmware.v1"));
    }

    #[test]
    fn parse_size_reads_suffixes() {
        assert_eq!(parse_size("500"), Some(500));
        assert_eq!(parse_size("1K"), Some(1024));
        assert_eq!(parse_size("2M"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("1G"), Some(1024 * 1024 * 1024));
    }
}
