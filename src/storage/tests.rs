use super::error::Error;
use super::*;
use std::time::Duration;

fn exercise_store<S: KeyValueStore>(store: &S) {
    store.mkdir("/cookies").unwrap();
    assert!(store.exists("/cookies"));

    store.write("/cookies/a.json", b"[1]").unwrap();
    store.write("/cookies/b.json", b"[2]").unwrap();
    assert_eq!(store.read("/cookies/a.json").unwrap(), Some(b"[1]".to_vec()));

    // Writes truncate.
    store.write("/cookies/a.json", b"[]").unwrap();
    assert_eq!(store.read("/cookies/a.json").unwrap(), Some(b"[]".to_vec()));

    let mut names = store.list("/cookies").unwrap();
    names.sort();
    assert_eq!(names, vec!["a.json".to_string(), "b.json".to_string()]);

    assert!(store.remove("/cookies/a.json").unwrap());
    assert!(!store.remove("/cookies/a.json").unwrap());
    assert_eq!(store.read("/cookies/a.json").unwrap(), None);
    assert!(!store.exists("/cookies/a.json"));
}

#[test]
fn test_memory_store_operations() {
    exercise_store(&MemoryStore::new());
}

#[test]
fn test_file_store_operations() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::mount(dir.path(), &[]).unwrap();
    exercise_store(&store);
    assert!(dir.path().join("cookies").join("b.json").exists());
}

#[test]
fn test_file_store_mount_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("flash");
    let store = FileStore::mount(&root, &["/cookies"]).unwrap();
    assert!(store.exists("/cookies"));
    assert!(root.join("cookies").is_dir());
}

#[test]
fn test_invalid_keys() {
    let store = MemoryStore::new();
    assert_eq!(store.write("", b"x"), Err(Error::InvalidKey));
    assert_eq!(store.write("/../etc/passwd", b"x"), Err(Error::InvalidKey));
    assert_eq!(store.read("/a/../b"), Err(Error::InvalidKey));
    assert!(!store.exists(".."));
}

#[test]
fn test_list_missing_directory_is_empty() {
    let store = MemoryStore::new();
    assert!(store.list("/nothing").unwrap().is_empty());

    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    assert!(store.list("/nothing").unwrap().is_empty());
}

#[test]
fn test_key_normalization() {
    assert_eq!(normalize_key("cookies//a.json").unwrap(), "/cookies/a.json");
    assert_eq!(split_key("/cookies/a.json"), ("/cookies", "a.json"));
    assert_eq!(split_key("/top"), ("/", "top"));
}

#[test]
fn test_deferred_blocks_until_mounted() {
    let store = Deferred::spawn(|| {
        std::thread::sleep(Duration::from_millis(50));
        let store = MemoryStore::new();
        store.mkdir("/cookies")?;
        Ok(store)
    });
    // The first call waits for the background mount.
    store.write("/cookies/x.json", b"{}").unwrap();
    assert!(store.is_settled());
    assert_eq!(store.read("/cookies/x.json").unwrap(), Some(b"{}".to_vec()));
}

#[test]
fn test_deferred_failed_mount() {
    let store: Deferred<MemoryStore> = Deferred::spawn(|| Err(Error::StorageFault));
    assert_eq!(store.read("/x"), Err(Error::NotInitialized));
    assert!(!store.exists("/x"));
}

#[test]
fn test_deferred_timeout() {
    let store = Deferred::spawn(|| {
        std::thread::sleep(Duration::from_millis(500));
        Ok(MemoryStore::new())
    })
    .with_timeout(Duration::from_millis(10));
    assert_eq!(store.read("/x"), Err(Error::NotInitialized));
}
