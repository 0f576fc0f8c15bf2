//! Integration tests for author resolution against real git repositories
//!
//! Fixture repositories are built with libgit2 in temp directories; history
//! is read through the `git` binary, so tests return early when it is not
//! installed. Lookups use an in-memory resolver keyed by commit id.

use git2::{Oid, Repository, Signature};
use repo_authors::cache::{load_cache, save_cache};
use repo_authors::{
    AuthorResolver, AuthorsError, EmailCache, GitLog, IdentityResolver, LookupError,
    LookupFailure, ResolveOptions,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Commit id -> handle table, recording every lookup
#[derive(Default)]
struct TableResolver {
    handles: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl TableResolver {
    fn add(&self, commit: Oid, handle: &str) {
        self.handles
            .lock()
            .unwrap()
            .insert(commit.to_string(), handle.to_string());
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl IdentityResolver for TableResolver {
    fn resolve(&self, commit: &str) -> Result<String, LookupError> {
        self.calls.lock().unwrap().push(commit.to_string());
        self.handles
            .lock()
            .unwrap()
            .get(commit)
            .cloned()
            .ok_or_else(|| LookupError::MissingHandle {
                commit: commit.to_string(),
            })
    }
}

struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init repo");
        Self { dir, repo }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Stage the given adds/removes and commit them as `email`.
    fn commit(&self, email: &str, add: &[(&str, &str)], remove: &[&str]) -> Oid {
        let mut index = self.repo.index().unwrap();
        for (rel, content) in add {
            let full = self.root().join(rel);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, content).unwrap();
            index.add_path(Path::new(rel)).unwrap();
        }
        for rel in remove {
            let _ = fs::remove_file(self.root().join(rel));
            index.remove_path(Path::new(rel)).unwrap();
        }
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::now("Someone", email).unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, "change", &tree, &parents)
            .unwrap()
    }

    fn resolver(&self, table: &Arc<TableResolver>, options: ResolveOptions) -> AuthorResolver {
        let history = GitLog::discover(self.root(), options.git_bin.clone()).unwrap();
        AuthorResolver::new(Arc::new(history), table.clone(), options)
    }
}

const CONTENT: &str = "line one\nline two\nline three\nline four\nline five\nline six\n";

#[test]
fn test_rename_follow_scoping() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    let table = Arc::new(TableResolver::default());

    let c1 = fx.commit("alice@example.com", &[("old.txt", CONTENT)], &[]);
    let c2 = fx.commit("bob@example.com", &[("new.txt", CONTENT)], &["old.txt"]);
    let edited = format!("{CONTENT}line seven\n");
    let c3 = fx.commit("carol@example.com", &[("new.txt", edited.as_str())], &[]);
    table.add(c1, "alice");
    table.add(c2, "bob");
    table.add(c3, "carol");

    let cache = EmailCache::new();
    let followed = fx
        .resolver(&table, ResolveOptions::default())
        .resolve_authors(&["new.txt"], &cache)
        .unwrap();
    let unfollowed = fx
        .resolver(
            &table,
            ResolveOptions {
                follow_renames: false,
                ..ResolveOptions::default()
            },
        )
        .resolve_authors(&["new.txt"], &EmailCache::new())
        .unwrap();

    let followed: Vec<&str> = followed[0].iter().collect();
    let unfollowed: Vec<&str> = unfollowed[0].iter().collect();
    assert_eq!(followed, vec!["alice", "bob", "carol"]);
    assert_eq!(unfollowed, vec!["bob", "carol"]);
}

#[test]
fn test_directory_history_and_persistence() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    let table = Arc::new(TableResolver::default());

    let c1 = fx.commit("alice@example.com", &[("src/a.rs", "fn a() {}\n")], &[]);
    let c2 = fx.commit("bob@example.com", &[("src/b.rs", "fn b() {}\n")], &[]);
    let c3 = fx.commit("alice@example.com", &[("src/a.rs", "fn a2() {}\n")], &[]);
    let c4 = fx.commit("dan@example.com", &[("README.md", "hi\n")], &[]);
    for (oid, handle) in [(c1, "alice"), (c2, "bob"), (c3, "alice"), (c4, "dan")] {
        table.add(oid, handle);
    }

    let cache = EmailCache::new();
    let sets = fx
        .resolver(&table, ResolveOptions::default())
        .resolve_authors(&["src", "src/a.rs", "README.md", "src"], &cache)
        .unwrap();

    let names: Vec<Vec<&str>> = sets.iter().map(|s| s.iter().collect()).collect();
    assert_eq!(
        names,
        vec![
            vec!["alice", "bob"],
            vec!["alice"],
            vec!["dan"],
            vec!["alice", "bob"],
        ]
    );
    // Three distinct emails, three lookups
    assert_eq!(table.calls(), 3);

    let cache_file = fx.root().join(".cache").join("authors.json");
    save_cache(&cache_file, &cache).unwrap();
    let reloaded = load_cache(&cache_file).unwrap();
    assert_eq!(reloaded, cache);
    assert_eq!(reloaded.len(), 3);

    // Second run with the persisted cache never hits the resolver
    let again = fx
        .resolver(&table, ResolveOptions::default())
        .resolve_authors(&["src", "src/a.rs", "README.md", "src"], &reloaded)
        .unwrap();
    assert_eq!(again, sets);
    assert_eq!(table.calls(), 3);
}

#[test]
fn test_unresolvable_author_is_reported_and_skipped() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    let table = Arc::new(TableResolver::default());

    let c1 = fx.commit("alice@example.com", &[("lib.rs", "// one\n")], &[]);
    let c9 = fx.commit("ghost@example.com", &[("lib.rs", "// two\n")], &[]);
    table.add(c1, "alice");

    let failures: Arc<Mutex<Vec<LookupFailure>>> = Arc::default();
    let sink = Arc::clone(&failures);
    let options = ResolveOptions::default()
        .with_error_callback(move |f| sink.lock().unwrap().push(f.clone()));

    let cache = EmailCache::new();
    let sets = fx
        .resolver(&table, options)
        .resolve_authors(&["lib.rs"], &cache)
        .unwrap();

    assert_eq!(sets[0].iter().collect::<Vec<_>>(), vec!["alice"]);
    assert!(!cache.contains("ghost@example.com"));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].commit, c9.to_string());
    assert_eq!(failures[0].email, "ghost@example.com");
}

#[test]
fn test_missing_path_fails_the_batch() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    let table = Arc::new(TableResolver::default());
    fx.commit("alice@example.com", &[("a.txt", "a\n")], &[]);

    let result = fx
        .resolver(&table, ResolveOptions::default())
        .resolve_authors(&["a.txt", "nope.txt"], &EmailCache::new());
    assert!(matches!(result, Err(AuthorsError::PathNotFound(_))));
}

#[test]
fn test_bad_git_binary_fails() {
    let fx = Fixture::new();
    let table = Arc::new(TableResolver::default());
    fx.commit("alice@example.com", &[("a.txt", "a\n")], &[]);

    let options = ResolveOptions {
        git_bin: "no-such-git-binary-here".to_string(),
        ..ResolveOptions::default()
    };
    let result = fx
        .resolver(&table, options)
        .resolve_authors(&["a.txt"], &EmailCache::new());
    assert!(matches!(result, Err(AuthorsError::Spawn { .. })));
}
