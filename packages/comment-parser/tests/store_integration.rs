//! Integration tests for the JSON-backed record store.

use std::collections::HashSet;

use comment_parser::{CommentId, CommentStore, CreateComment, JsonCommentStore, Platform};

fn test_store() -> (tempfile::TempDir, JsonCommentStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonCommentStore::open(dir.path().join("comments_db.json"));
    (dir, store)
}

#[test]
fn test_create_list_delete_scenario() {
    let (_dir, store) = test_store();

    for content in ["first", "second", "third"] {
        assert!(store.create(CreateComment::new("https://example.com/post", content, Platform::Test)));
    }

    let all = store.get_all();
    assert_eq!(all.len(), 3);
    let contents: HashSet<_> = all.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, HashSet::from(["first", "second", "third"]));
    assert!(all.iter().all(|c| c.source == Platform::Test));

    assert!(store.delete(&all[0].id));
    assert_eq!(store.get_all().len(), 2);
    assert!(store.get(&all[0].id).is_none());
}

#[test]
fn test_get_returns_created_fields() {
    let (_dir, store) = test_store();
    let input = CreateComment::new("https://vk.com/wall-1_2", "Привет", Platform::Vk)
        .with_likes(7)
        .with_date("2024-01-01 12:00:00")
        .with_author("42");

    let id = store.insert(input.clone()).unwrap();
    let comment = store.get(&id).unwrap();

    assert_eq!(comment.id, id);
    assert_eq!(comment.url, input.url);
    assert_eq!(comment.content, input.content);
    assert_eq!(comment.likes, input.likes);
    assert_eq!(comment.date, input.date);
    assert_eq!(comment.source, input.source);
}

#[test]
fn test_unknown_id_is_absent() {
    let (_dir, store) = test_store();
    assert!(store.get(&CommentId::from("missing")).is_none());

    store.create(CreateComment::new("u", "c", Platform::Test));
    assert!(store.get(&CommentId::from("missing")).is_none());
}

#[test]
fn test_delete_absent_id_leaves_others() {
    let (_dir, store) = test_store();
    let kept = store
        .insert(CreateComment::new("u", "kept", Platform::Test))
        .unwrap();

    assert!(store.delete(&CommentId::from("missing")));
    assert!(store.delete(&CommentId::from("missing")));

    assert_eq!(store.count(), 1);
    assert_eq!(store.get(&kept).unwrap().content, "kept");
}

#[test]
fn test_generated_ids_are_unique() {
    let (_dir, store) = test_store();
    let ids: HashSet<_> = (0..20)
        .map(|i| {
            store
                .insert(CreateComment::new("u", format!("c{i}"), Platform::Test))
                .unwrap()
        })
        .collect();
    assert_eq!(ids.len(), 20);
    assert_eq!(store.count(), 20);
}

#[test]
fn test_reopened_store_sees_persisted_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("comments_db.json");

    let id = JsonCommentStore::open(&path)
        .insert(CreateComment::new("u", "durable", Platform::Youtube))
        .unwrap();

    let reopened = JsonCommentStore::open(&path);
    assert_eq!(reopened.get(&id).unwrap().content, "durable");
}
