use super::*;
use tempfile::TempDir;

fn write_page(dir: &TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(name), body).expect("should write page");
}

#[test]
fn strips_non_content_elements() {
    let html = r#"
        <html>
          <head><title>Rules</title><style>p { color: red; }</style></head>
          <body>
            <nav><a href="/">Home</a></nav>
            <p>Gold increases by 1 per tick per owned tile.</p>
            <script>console.log("hi");</script>
            <footer>Copyright</footer>
          </body>
        </html>
    "#;

    let text = extract_text(html);
    assert!(text.contains("Gold increases by 1 per tick per owned tile."));
    assert!(text.contains("Rules"));
    assert!(!text.contains("Home"));
    assert!(!text.contains("Copyright"));
    assert!(!text.contains("console.log"));
    assert!(!text.contains("color: red"));
}

#[test]
fn block_elements_become_separate_lines() {
    let html = "<body><h1>Title</h1><p>First paragraph.</p><p>Second paragraph.</p></body>";
    let text = extract_text(html);

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["Title", "First paragraph.", "Second paragraph."]);
}

#[test]
fn malformed_markup_still_extracts() {
    // html5ever recovers from unclosed tags rather than failing.
    let text = extract_text("<body><p>Unclosed <b>bold text");
    assert!(text.contains("Unclosed"));
    assert!(text.contains("bold text"));
}

#[test]
fn walks_directory_recursively() {
    let dir = TempDir::new().expect("should create temp dir");
    fs::create_dir(dir.path().join("guides")).expect("should create subdir");
    write_page(&dir, "index.html", "<p>Welcome to the game.</p>");
    fs::write(
        dir.path().join("guides").join("gold.htm"),
        "<p>Gold is earned every tick.</p>",
    )
    .expect("should write page");
    write_page(&dir, "notes.txt", "not html, ignored");

    let site = extract_site(dir.path()).expect("extraction should succeed");

    assert_eq!(site.documents.len(), 2);
    assert!(site.warnings.is_empty());
    let names: Vec<String> = site.documents.iter().map(|d| d.source_name()).collect();
    assert!(names.contains(&"index.html".to_string()));
    assert!(names.contains(&"gold.htm".to_string()));
}

#[test]
fn bad_files_warn_without_aborting() {
    let dir = TempDir::new().expect("should create temp dir");
    write_page(&dir, "good.html", "<p>Readable content.</p>");
    // Invalid UTF-8 cannot be decoded and must become a warning.
    fs::write(dir.path().join("broken.html"), [0xff, 0xfe, 0xfd])
        .expect("should write bytes");

    let site = extract_site(dir.path()).expect("extraction should succeed");

    assert_eq!(site.documents.len(), 1);
    assert_eq!(site.warnings.len(), 1);
    assert_eq!(
        site.warnings[0].path.file_name().and_then(|n| n.to_str()),
        Some("broken.html")
    );
}

#[test]
fn empty_pages_are_skipped_silently() {
    let dir = TempDir::new().expect("should create temp dir");
    write_page(&dir, "empty.html", "<body><script>only_code();</script></body>");

    let site = extract_site(dir.path()).expect("extraction should succeed");
    assert!(site.documents.is_empty());
    assert!(site.warnings.is_empty());
}

#[test]
fn missing_directory_is_fatal() {
    let dir = TempDir::new().expect("should create temp dir");
    let missing = dir.path().join("nope");

    let err = extract_site(&missing).expect_err("should fail");
    assert!(matches!(err, crate::SiteQaError::ContentNotFound(_)));
}
