use pretty_assertions::assert_eq;
use ragflow_listing::{FilterConfig, ListingEntry, RepoListing, apply_filter, summarize};

fn sample_listing() -> RepoListing {
    RepoListing::new("octo", "sample", "github").with_entries([
        ListingEntry::file("CHANGES.md", 100),
        ListingEntry::file("guide.md", 200),
        ListingEntry::file("notes.md", 300),
        ListingEntry::file("setup.py", 400),
        ListingEntry::file("manage.py", 500),
        ListingEntry::folder("src"),
        ListingEntry::file("src/index.js", 10),
        ListingEntry::file("src/app.js", 20),
        ListingEntry::file("src/router.js", 30),
        ListingEntry::file("src/store.js", 40),
    ])
}

#[test]
fn folder_and_extension_select_only_matching_files() {
    let config = FilterConfig::new().with_folder("src").with_extension("js");

    let selection = apply_filter(&sample_listing(), &config);

    let paths: Vec<_> = selection.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["src/index.js", "src/app.js", "src/router.js", "src/store.js"]
    );
    assert_eq!(selection.owner, "octo");
    assert_eq!(selection.repo, "sample");
}

#[test]
fn root_markdown_without_folders() {
    let config = FilterConfig::new().with_extension("md");
    let selection = apply_filter(&sample_listing(), &config);
    assert_eq!(selection.files().count(), 3);
}

#[test]
fn listing_round_trips_through_json() {
    let listing = sample_listing();
    let json = serde_json::to_string(&listing).unwrap();
    let decoded = RepoListing::from_json(&json).unwrap();
    assert_eq!(decoded, listing);

    let summary = summarize(&decoded);
    assert_eq!(summary.files, 9);
    assert_eq!(summary.by_class["js"], 4);
}
