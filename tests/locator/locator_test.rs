//! URL parsing, `%23` handling, storage keys and share links.

use nbfiddle::locator::{
    gist_file_uri, share_link, GistRef, GithubRef, LocatorError, NotebookParams, RemoteRef,
    StorageKey, StorageKind,
};

#[test]
fn parses_github_blob_url() {
    let remote =
        RemoteRef::parse("https://github.com/alice/demo/blob/main/notebooks/intro.ipynb")
            .expect("valid github url");

    assert_eq!(
        remote,
        RemoteRef::Github(GithubRef {
            owner: "alice".to_owned(),
            repo: "demo".to_owned(),
            branch: "main".to_owned(),
            path: "notebooks/intro.ipynb".to_owned(),
        })
    );
    assert_eq!(
        remote.storage_key().as_str(),
        "github:alice/demo/main/notebooks/intro.ipynb"
    );
}

#[test]
fn github_url_without_blob_segment_is_rejected() {
    let result = RemoteRef::parse("https://github.com/alice/demo/tree/main/intro.ipynb");
    assert!(matches!(result, Err(LocatorError::InvalidGithubUrl(_))));

    let result = RemoteRef::parse("https://github.com/alice/demo/blob/main");
    assert!(matches!(result, Err(LocatorError::InvalidGithubUrl(_))));
}

#[test]
fn github_paths_keep_literal_percent_23() {
    let remote = RemoteRef::parse("https://github.com/alice/demo/blob/main/a%23b.ipynb")
        .expect("valid github url");

    match &remote {
        RemoteRef::Github(github) => assert_eq!(github.path, "a%23b.ipynb"),
        other => panic!("expected github ref, got {other:?}"),
    }
    assert_eq!(remote.storage_key().as_str(), "github:alice/demo/main/a%23b.ipynb");
}

#[test]
fn encoded_and_plain_gist_urls_are_equivalent() {
    let plain = RemoteRef::parse("https://gist.github.com/bob/0123abcd#file-analysis-ipynb")
        .expect("plain gist url");
    let encoded = RemoteRef::parse("https://gist.github.com/bob/0123abcd%23file-analysis-ipynb")
        .expect("encoded gist url");

    assert_eq!(plain, encoded);
    assert_eq!(plain.storage_key(), encoded.storage_key());
    assert_eq!(
        plain,
        RemoteRef::Gist(GistRef {
            owner: "bob".to_owned(),
            gist_id: "0123abcd".to_owned(),
            file_morphed: "analysis-ipynb".to_owned(),
        })
    );
    assert_eq!(plain.storage_key().as_str(), "gist:bob/0123abcd/analysis-ipynb");
}

#[test]
fn gist_url_errors_are_specific() {
    assert_eq!(
        RemoteRef::parse("https://gist.github.com/bob/0123abcd"),
        Err(LocatorError::MissingGistFile)
    );
    assert_eq!(
        RemoteRef::parse("https://gist.github.com/bob#file-a-ipynb"),
        Err(LocatorError::InvalidGistUrl)
    );
    assert_eq!(
        RemoteRef::parse("https://gist.github.com/bob/0123abcd#comments"),
        Err(LocatorError::InvalidGistFile)
    );
}

#[test]
fn other_hosts_are_unsupported() {
    let result = RemoteRef::parse("https://gitlab.com/alice/demo/-/blob/main/a.ipynb");
    assert!(matches!(result, Err(LocatorError::UnsupportedUrl(_))));
}

#[test]
fn query_with_encoded_gist_url() {
    let params = NotebookParams::parse_query(
        "?url=https://gist.github.com/bob/0123abcd%23file-analysis-ipynb",
    )
    .expect("query should parse");

    let gist = params
        .remote
        .as_ref()
        .and_then(RemoteRef::as_gist)
        .expect("gist remote");
    assert_eq!(gist.file_morphed, "analysis-ipynb");
    assert_eq!(params.storage_key().kind(), StorageKind::Gist);
}

#[test]
fn localname_wins_over_url_for_storage() {
    let params = NotebookParams::parse_query(
        "url=https%3A%2F%2Fgithub.com%2Fa%2Fr%2Fblob%2Fmain%2Fx.ipynb&localname=mine",
    )
    .expect("query should parse");

    assert!(params.remote.is_some());
    assert_eq!(params.storage_key(), StorageKey::local("mine"));
}

#[test]
fn empty_query_selects_default_notebook() {
    let params = NotebookParams::parse_query("").expect("empty query");
    assert_eq!(params, NotebookParams::default());
    assert_eq!(params.storage_key(), StorageKey::default_local());
}

#[test]
fn blank_localname_is_ignored() {
    let params = NotebookParams::local(Some("   "));
    assert_eq!(params.storage_key(), StorageKey::default_local());
}

#[test]
fn embedded_flag_is_read() {
    let params = NotebookParams::parse_query("localname=a&embedded=1").expect("query");
    assert!(params.embedded);
}

#[test]
fn query_round_trips() {
    let params = NotebookParams::parse_query(
        "url=https://gist.github.com/bob/0123abcd%23file-analysis-ipynb&localname=copy",
    )
    .expect("query");
    let again = NotebookParams::parse_query(&params.to_query()).expect("rendered query");
    assert_eq!(params, again);
}

#[test]
fn share_link_encodes_fragment() {
    let file_uri = gist_file_uri("https://gist.github.com/bob/0123abcd", "My Analysis.ipynb");
    assert_eq!(
        file_uri,
        "https://gist.github.com/bob/0123abcd#file-My-Analysis-ipynb"
    );

    let link = share_link("https://nbfiddle.app/", &file_uri);
    assert_eq!(
        link,
        "https://nbfiddle.app/?url=https://gist.github.com/bob/0123abcd%23file-My-Analysis-ipynb"
    );

    let params = NotebookParams::parse_query(
        link.split_once('?').map(|(_, q)| q).expect("link has a query"),
    )
    .expect("share link should parse");
    assert!(params.remote.is_some());
}

#[test]
fn storage_key_kinds_and_names() {
    let key = StorageKey::new("github:alice/demo/main/a.ipynb");
    assert_eq!(key.kind(), StorageKind::Github);
    assert_eq!(key.kind().label(), "GitHub");
    assert_eq!(key.display_name(), "alice/demo/main/a.ipynb");
}

#[test]
fn gist_ref_from_created_gist_uri() {
    let gist = GistRef::from_gist_uri("https://gist.github.com/carol/new456", "My Notes.ipynb")
        .expect("gist uri");
    assert_eq!(
        gist,
        GistRef {
            owner: "carol".to_owned(),
            gist_id: "new456".to_owned(),
            file_morphed: "My-Notes-ipynb".to_owned(),
        }
    );

    let result = GistRef::from_gist_uri("https://gist.github.com/new456", "a.ipynb");
    assert!(matches!(result, Err(LocatorError::InvalidGistUrl)));
}
