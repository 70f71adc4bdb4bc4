//! Integration tests for manifest discovery and resolution in nested towns.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use rigwork::core::paths::{REDIRECT_FILE_NAME, ROUTES_FILE_NAME, STORE_DIR_NAME};
use rigwork::routing::{load_routes, Resolution, RouteError, Router};

fn mkstore(dir: &Path) -> std::path::PathBuf {
    let store = dir.join(STORE_DIR_NAME);
    fs::create_dir_all(&store).unwrap();
    store
}

/// town/
///   .store/routes.jsonl
///   services/backend/.store
///   services/api/.store
///   web/.store
fn nested_town(temp: &TempDir) {
    let root = temp.path();
    mkstore(root);
    for rig in ["services/backend", "services/api", "web"] {
        mkstore(&root.join(rig));
    }
    fs::write(
        root.join(STORE_DIR_NAME).join(ROUTES_FILE_NAME),
        "# prefix routes for the town\n\
         {\"prefix\": \"be-\", \"path\": \"services/backend\"}\n\
         {\"prefix\": \"api-\", \"path\": \"services/api\"}\n\
         \n\
         {\"prefix\": \"web-\", \"path\": \"web\"}\n",
    )
    .unwrap();
}

#[test]
fn nested_rig_finds_town_manifest() {
    let temp = TempDir::new().unwrap();
    nested_town(&temp);

    let local = temp.path().join("services/api").join(STORE_DIR_NAME);
    let router = Router::discover(&local).unwrap();

    assert_eq!(router.town_root(), Some(temp.path()));
    assert_eq!(router.routes().len(), 3);

    let own = router.resolve("api-x1").unwrap();
    assert_eq!(own.prefix, "api-");
    assert!(!own.remote);

    let sibling = router.resolve("be-x1.2").unwrap();
    assert!(sibling.remote);
    assert_eq!(
        sibling.root.as_deref(),
        Some(temp.path().join("services/backend").join(STORE_DIR_NAME).as_path())
    );

    assert_eq!(router.resolve("zz-x1").unwrap(), Resolution::local());
}

#[test]
fn town_root_rig_resolves_with_own_manifest() {
    let temp = TempDir::new().unwrap();
    nested_town(&temp);
    fs::write(
        temp.path().join(STORE_DIR_NAME).join(ROUTES_FILE_NAME),
        "{\"prefix\": \"hq-\", \"path\": \".\"}\n{\"prefix\": \"web-\", \"path\": \"web\"}\n",
    )
    .unwrap();

    let router = Router::discover(&temp.path().join(STORE_DIR_NAME)).unwrap();
    assert!(!router.resolve("hq-1").unwrap().remote);
    assert!(router.resolve("web-1").unwrap().remote);
    assert!(router.same_store("hq-1", "zz-unrouted"));
    assert!(!router.same_store("hq-1", "web-1"));
}

#[test]
fn redirect_target_replaces_nominal_path() {
    let temp = TempDir::new().unwrap();
    nested_town(&temp);
    let real = mkstore(&temp.path().join("archive/web"));
    fs::write(
        temp.path().join("web").join(STORE_DIR_NAME).join(REDIRECT_FILE_NAME),
        "# moved during the reorg\n../../archive/web/.store\n",
    )
    .unwrap();

    let router = Router::discover(&temp.path().join("web").join(STORE_DIR_NAME)).unwrap();
    let resolution = router.resolve("web-abc").unwrap();

    assert_eq!(
        resolution.root.unwrap().canonicalize().unwrap(),
        real.canonicalize().unwrap()
    );
    // The nominal location is where this router lives; the data is elsewhere.
    assert!(resolution.remote);
}

#[test]
fn redirect_to_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    nested_town(&temp);
    fs::write(
        temp.path().join("web").join(STORE_DIR_NAME).join(REDIRECT_FILE_NAME),
        "/definitely/not/here\n",
    )
    .unwrap();

    let router = Router::discover(&temp.path().join("services/api").join(STORE_DIR_NAME)).unwrap();
    let err = router.resolve("web-1").unwrap_err();
    assert!(matches!(err, RouteError::RedirectInvalid { .. }));
    assert!(!router.same_store("web-1", "web-2"));
}

#[test]
fn malformed_manifest_names_the_line() {
    let temp = TempDir::new().unwrap();
    let store = mkstore(temp.path());
    let manifest = store.join(ROUTES_FILE_NAME);
    fs::write(
        &manifest,
        "{\"prefix\": \"be-\", \"path\": \"backend\"}\n\
         {\"prefix\": \"fe-\", \"path\": }\n",
    )
    .unwrap();

    let err = load_routes(&manifest).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("line 2"), "{message}");
    assert!(matches!(err, RouteError::Malformed { line: 2, .. }));
}
