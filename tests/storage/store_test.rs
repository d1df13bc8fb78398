//! SQLite notebook store.

use serde_json::Map;

use nbfiddle::locator::{RemoteRef, StorageKey, StorageKind};
use nbfiddle::notebook::{Cell, Notebook, Origin};
use nbfiddle::storage::{origin_for_key, NotebookStore};

async fn store() -> NotebookStore {
    NotebookStore::in_memory()
        .await
        .expect("in-memory store should open")
}

fn imported(source: &str) -> Notebook {
    Notebook::from_parts(
        vec![Cell::code(source)],
        Map::new(),
        Origin::Imported {
            file_name: "x.ipynb".to_owned(),
        },
    )
}

fn created(source: &str) -> Notebook {
    let mut nb = Notebook::create();
    nb.push(Cell::code(source));
    nb
}

#[tokio::test]
async fn save_then_load_round_trips_cells() {
    let store = store().await;
    let key = StorageKey::local("scratch");
    let nb = created("x = 1");

    store.save(&key, &nb).await.expect("save");
    let loaded = store
        .load(&key)
        .await
        .expect("load")
        .expect("notebook stored");

    assert!(nb.content_eq(&loaded.notebook));
    assert!(loaded.is_trusted);
    assert_eq!(
        loaded.notebook.origin(),
        &Origin::Local {
            name: Some("scratch".to_owned())
        }
    );
}

#[tokio::test]
async fn missing_key_loads_as_none() {
    let store = store().await;
    let loaded = store.load(&StorageKey::local("nope")).await.expect("load");
    assert!(loaded.is_none());
}

#[tokio::test]
async fn untrusted_notebooks_stay_untrusted() {
    let store = store().await;
    let key = StorageKey::local("imported");

    store.save(&key, &imported("x")).await.expect("save");
    let loaded = store.load(&key).await.expect("load").expect("stored");

    assert!(!loaded.is_trusted);
    assert!(!loaded.notebook.is_trusted());
    assert!(!store.is_trusted(&key).await.expect("query"));
}

#[tokio::test]
async fn grant_trust_persists_across_loads() {
    let store = store().await;
    let key = StorageKey::local("imported");
    store.save(&key, &imported("x")).await.expect("save");

    store.grant_trust(&key).await.expect("grant");
    store.grant_trust(&key).await.expect("second grant is a no-op");

    let loaded = store.load(&key).await.expect("load").expect("stored");
    assert!(loaded.notebook.is_trusted());
    assert!(store.is_trusted(&key).await.expect("query"));
}

#[tokio::test]
async fn grant_is_recorded_before_any_save() {
    let store = store().await;
    let remote = RemoteRef::parse("https://gist.github.com/bob/abc#file-a-ipynb").expect("url");
    let key = remote.storage_key();

    store.grant_trust(&key).await.expect("grant");
    assert!(store.is_trusted(&key).await.expect("query"));

    let mut nb = imported("x");
    nb.grant_trust();
    store.save(&key, &nb).await.expect("save trusted copy");
    let loaded = store.load(&key).await.expect("load").expect("stored");
    assert!(loaded.notebook.is_trusted());
    assert_eq!(loaded.notebook.origin(), &Origin::Remote(remote));
}

#[tokio::test]
async fn untrusted_save_keeps_existing_grant() {
    let store = store().await;
    let key = StorageKey::local("shared");
    store.save(&key, &imported("first")).await.expect("save");
    store.grant_trust(&key).await.expect("grant");

    store.save(&key, &imported("second")).await.expect("stale save");

    assert!(store.is_trusted(&key).await.expect("query"));
    let loaded = store.load(&key).await.expect("load").expect("stored");
    assert!(loaded.notebook.is_trusted());
    assert_eq!(loaded.notebook.cells()[0].source, "second");
}

#[tokio::test]
async fn overwrite_with_untrusted_content_revokes_trust() {
    let store = store().await;
    let key = StorageKey::local("shared");
    store.save(&key, &imported("first")).await.expect("save");
    store.grant_trust(&key).await.expect("grant");

    store.overwrite(&key, &imported("second")).await.expect("overwrite");

    assert!(!store.is_trusted(&key).await.expect("query"));
    let loaded = store.load(&key).await.expect("load").expect("stored");
    assert!(!loaded.notebook.is_trusted());
    assert_eq!(loaded.notebook.cells()[0].source, "second");
}

#[tokio::test]
async fn list_reports_kind_size_and_cells() {
    let store = store().await;
    store
        .save(&StorageKey::default_local(), &created("a"))
        .await
        .expect("save default");
    store
        .save(
            &StorageKey::new("github:o/r/main/nb.ipynb"),
            &imported("b"),
        )
        .await
        .expect("save github copy");

    let list = store.list().await.expect("list");

    assert_eq!(list.len(), 2);
    let github = list
        .iter()
        .find(|s| s.kind == StorageKind::Github)
        .expect("github entry");
    assert_eq!(github.num_cells, 1);
    assert!(github.size_bytes > 0);
    assert!(!github.is_trusted);
    assert_eq!(github.display_name(), "o/r/main/nb.ipynb");
}

#[tokio::test]
async fn delete_removes_notebook_and_grant() {
    let store = store().await;
    let key = StorageKey::local("gone");
    store.save(&key, &imported("x")).await.expect("save");
    store.grant_trust(&key).await.expect("grant");

    assert!(store.delete(&key).await.expect("delete"));
    assert!(!store.delete(&key).await.expect("second delete"));
    assert!(store.load(&key).await.expect("load").is_none());
    assert!(!store.is_trusted(&key).await.expect("query"));
}

#[tokio::test]
async fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("data").join("notebooks.db");
    let key = StorageKey::local("persist");

    {
        let store = NotebookStore::open(&path).await.expect("open");
        store.save(&key, &created("kept")).await.expect("save");
    }

    let store = NotebookStore::open(&path).await.expect("reopen");
    let loaded = store.load(&key).await.expect("load").expect("stored");
    assert_eq!(loaded.notebook.cells()[0].source, "kept");
}

#[test]
fn origin_follows_key_prefix() {
    assert_eq!(
        origin_for_key(&StorageKey::default_local()),
        Origin::Local { name: None }
    );
    assert!(matches!(
        origin_for_key(&StorageKey::new("github:o/r/main/a.ipynb")),
        Origin::Remote(RemoteRef::Github(_))
    ));
}
