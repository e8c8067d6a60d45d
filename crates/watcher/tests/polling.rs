//! End-to-end tests for the polling watcher
//!
//! Each test runs a real poll loop on its own thread against a temporary
//! directory and observes it through the public channels.

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use filetime::FileTime;
use pollwatch::{Event, ListError, Op, WatchError, Watcher};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const INTERVAL: Duration = Duration::from_millis(20);
const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

/// A watcher whose poll loop runs on a background thread
struct Running {
    watcher: Arc<Watcher>,
    handle: thread::JoinHandle<Result<(), WatchError>>,
}

impl Running {
    fn spawn(watcher: Watcher) -> Self {
        let watcher = Arc::new(watcher);
        let handle = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.start(INTERVAL))
        };
        watcher.wait();
        Self { watcher, handle }
    }

    fn stop(self) {
        self.watcher.close();
        self.handle.join().unwrap().unwrap();
    }
}

/// Receive until an event matches, failing after `TIMEOUT`
fn expect_event(rx: &Receiver<Event>, pred: impl Fn(&Event) -> bool) -> Event {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(event) if pred(&event) => return event,
            Ok(_) => continue,
            Err(err) => panic!("no matching event: {err}"),
        }
    }
}

/// Everything received during a quiet period
fn drain(rx: &Receiver<Event>) -> Vec<Event> {
    let deadline = Instant::now() + QUIET;
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        events.push(event);
    }
    events
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_mtime_change_yields_single_write() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let f1 = temp_dir.path().join("f1");
    fs::write(&f1, b"data")?;

    let watcher = Watcher::new();
    watcher.add(temp_dir.path())?;
    let events = watcher.events();
    let running = Running::spawn(watcher);

    filetime::set_file_mtime(&f1, FileTime::from_unix_time(1_000_000_000, 0))?;

    let event = expect_event(&events, |e| e.op == Op::Write && !e.meta.is_dir);
    assert_eq!(event.path, path_str(&f1));
    assert_eq!(event.meta.name, "f1");

    let repeats = drain(&events)
        .into_iter()
        .filter(|e| e.path == path_str(&f1))
        .count();
    assert_eq!(repeats, 0);

    running.stop();
    Ok(())
}

#[test]
fn test_rename_in_same_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let f1 = temp_dir.path().join("f1");
    let f2 = temp_dir.path().join("f2");
    fs::write(&f1, b"data")?;

    let watcher = Watcher::new();
    watcher.add(temp_dir.path())?;
    watcher.filter_ops([Op::Create, Op::Remove, Op::Rename, Op::Move]);
    let events = watcher.events();
    let running = Running::spawn(watcher);

    fs::rename(&f1, &f2)?;

    let event = expect_event(&events, |_| true);
    assert_eq!(event.op, Op::Rename);
    assert_eq!(event.path, format!("{} -> {}", f1.display(), f2.display()));
    assert_eq!(event.old_path.as_deref(), Some(f1.as_path()));
    assert!(drain(&events).is_empty());

    running.stop();
    Ok(())
}

#[test]
fn test_move_between_directories() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let a = temp_dir.path().join("a");
    let b = temp_dir.path().join("b");
    fs::create_dir(&a)?;
    fs::create_dir(&b)?;
    fs::write(a.join("x"), b"data")?;

    let watcher = Watcher::new();
    watcher.add_recursive(temp_dir.path())?;
    watcher.filter_ops([Op::Create, Op::Remove, Op::Rename, Op::Move]);
    let events = watcher.events();
    let running = Running::spawn(watcher);

    fs::rename(a.join("x"), b.join("x"))?;

    let event = expect_event(&events, |_| true);
    assert_eq!(event.op, Op::Move);
    assert_eq!(event.old_path.as_deref(), Some(a.join("x").as_path()));
    assert!(event.path.ends_with(&path_str(&b.join("x"))));

    running.stop();
    Ok(())
}

#[test]
fn test_create_and_remove() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let watcher = Watcher::new();
    watcher.add(temp_dir.path())?;
    watcher.filter_ops([Op::Create, Op::Remove]);
    let events = watcher.events();
    let running = Running::spawn(watcher);

    let file = temp_dir.path().join("new.txt");
    fs::write(&file, b"new")?;
    let created = expect_event(&events, |_| true);
    assert_eq!(created.op, Op::Create);
    assert_eq!(created.path, path_str(&file));

    fs::remove_file(&file)?;
    let removed = expect_event(&events, |_| true);
    assert_eq!(removed.op, Op::Remove);
    assert_eq!(removed.path, path_str(&file));

    running.stop();
    Ok(())
}

#[test]
fn test_event_cap_drops_rest_of_cycle() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let watcher = Watcher::new();
    watcher.add(temp_dir.path())?;
    watcher.filter_ops([Op::Create]);
    watcher.set_max_events(1);

    // Both files land in the first cycle
    fs::write(temp_dir.path().join("one"), b"1")?;
    fs::write(temp_dir.path().join("two"), b"2")?;

    let events = watcher.events();
    let running = Running::spawn(watcher);

    let first = expect_event(&events, |_| true);
    assert_eq!(first.op, Op::Create);
    assert!(drain(&events).is_empty());
    assert_eq!(running.watcher.watched_files().len(), 3);

    running.stop();
    Ok(())
}

#[test]
fn test_hidden_files_are_suppressed() -> Result<()> {
    let temp_dir = tempfile::Builder::new().prefix("pollwatch").tempdir()?;
    let watcher = Watcher::new();
    watcher.ignore_hidden_files(true);
    watcher.add(temp_dir.path())?;
    watcher.filter_ops([Op::Create]);
    let events = watcher.events();
    let running = Running::spawn(watcher);

    fs::write(temp_dir.path().join(".secret"), b"s")?;
    fs::write(temp_dir.path().join("visible"), b"v")?;

    let event = expect_event(&events, |_| true);
    assert_eq!(event.meta.name, "visible");
    assert!(drain(&events).is_empty());

    running.stop();
    Ok(())
}

#[test]
fn test_ignore_after_recursive_add_purges_subtree() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let skip = temp_dir.path().join("a/b");
    fs::create_dir_all(skip.join("c"))?;
    fs::write(skip.join("c/file"), b"f")?;
    fs::write(temp_dir.path().join("a/keep"), b"k")?;

    let watcher = Watcher::new();
    watcher.add_recursive(temp_dir.path())?;
    assert!(watcher.watched_files().contains(&skip.join("c/file")));

    watcher.ignore([&skip])?;
    assert!(watcher.watched_files().paths().all(|p| !p.starts_with(&skip)));

    let events = watcher.events();
    let running = Running::spawn(watcher);

    fs::write(skip.join("later"), b"l")?;
    fs::write(temp_dir.path().join("a/seen"), b"s")?;

    let event = expect_event(&events, |e| e.op == Op::Create);
    assert_eq!(event.meta.name, "seen");
    assert!(drain(&events).iter().all(|e| !e.path.contains("later")));
    assert!(running
        .watcher
        .watched_files()
        .paths()
        .all(|p| !p.starts_with(&skip)));

    running.stop();
    Ok(())
}

#[test]
fn test_deleted_root_is_reported_and_deregistered() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let sub = temp_dir.path().join("sub");
    fs::create_dir(&sub)?;
    fs::write(sub.join("file"), b"f")?;

    let watcher = Watcher::new();
    watcher.add_recursive(&sub)?;
    let errors = watcher.errors();
    let events = watcher.events();
    let running = Running::spawn(watcher);

    fs::remove_dir_all(&sub)?;

    match errors.recv_timeout(TIMEOUT)? {
        WatchError::WatchedPathDeleted(path) => assert_eq!(path, sub),
        other => panic!("unexpected error: {other}"),
    }
    assert!(drain(&events).is_empty());
    assert!(running.watcher.watched_roots().is_empty());
    assert!(running.watcher.watched_files().is_empty());

    running.stop();
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unreadable_root_keeps_its_entries() -> Result<()> {
    use std::os::unix::fs::symlink;

    let temp_dir = TempDir::new()?;
    let base = temp_dir.path();
    fs::create_dir_all(base.join("real/e"))?;
    fs::write(base.join("real/e/f"), b"f")?;
    fs::write(base.join("blocker"), b"b")?;
    let link = base.join("d");
    symlink(base.join("real"), &link)?;
    let root = link.join("e");

    let watcher = Watcher::new();
    watcher.add(&root)?;
    let tracked = watcher.watched_files();
    assert_eq!(tracked.len(), 2);

    // Point d at a regular file so d/e fails with something other than NotFound
    symlink(base.join("blocker"), base.join("d.tmp"))?;
    fs::rename(base.join("d.tmp"), &link)?;

    let errors = watcher.errors();
    let events = watcher.events();
    let running = Running::spawn(watcher);

    match errors.recv_timeout(TIMEOUT)? {
        WatchError::List(ListError::Io { path, .. }) => assert_eq!(path, root),
        other => panic!("unexpected error: {other}"),
    }
    let drainer = thread::spawn(move || errors.iter().count());

    assert!(drain(&events).is_empty());
    assert_eq!(running.watcher.watched_roots(), vec![(root.clone(), false)]);
    assert_eq!(
        running.watcher.watched_files().paths().collect::<Vec<_>>(),
        tracked.paths().collect::<Vec<_>>()
    );

    fs::write(base.join("real/e/g"), b"g")?;
    symlink(base.join("real"), base.join("d.tmp"))?;
    fs::rename(base.join("d.tmp"), &link)?;

    let event = expect_event(&events, |e| e.op == Op::Create);
    assert_eq!(event.path, path_str(&root.join("g")));

    running.stop();
    assert!(drainer.join().unwrap() >= 1);
    Ok(())
}

#[test]
fn test_racing_starts_admit_one_loop() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let watcher = Arc::new(Watcher::new());
    watcher.add(temp_dir.path())?;
    let barrier = Arc::new(Barrier::new(2));
    let (tx, rx) = crossbeam_channel::unbounded();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let watcher = Arc::clone(&watcher);
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            thread::spawn(move || {
                barrier.wait();
                tx.send(watcher.start(INTERVAL)).unwrap();
            })
        })
        .collect();
    drop(tx);

    // The loser returns right away while the winner keeps polling
    let first = rx.recv_timeout(TIMEOUT)?;
    assert!(matches!(first, Err(WatchError::AlreadyRunning)));
    watcher.wait();
    assert!(watcher.is_running());

    let closed = watcher.closed();
    watcher.close();
    assert!(rx.recv_timeout(TIMEOUT)?.is_ok());
    assert_eq!(
        closed.recv_timeout(TIMEOUT),
        Err(RecvTimeoutError::Disconnected)
    );

    for handle in handles {
        handle.join().unwrap();
    }
    Ok(())
}

#[test]
fn test_concurrent_start_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let watcher = Watcher::new();
    watcher.add(temp_dir.path())?;
    let running = Running::spawn(watcher);

    let err = running.watcher.start(INTERVAL).unwrap_err();
    assert!(matches!(err, WatchError::AlreadyRunning));
    assert!(running.watcher.is_running());

    running.stop();
    Ok(())
}

#[test]
fn test_start_after_too_short_interval() -> Result<()> {
    let watcher = Watcher::new();
    assert!(matches!(
        watcher.start(Duration::ZERO),
        Err(WatchError::DurationTooShort)
    ));

    let running = Running::spawn(watcher);
    assert!(running.watcher.is_running());

    running.stop();
    Ok(())
}

#[test]
fn test_close_ends_channels_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let watcher = Watcher::new();
    watcher.add(temp_dir.path())?;
    let events = watcher.events();
    let closed = watcher.closed();
    let running = Running::spawn(watcher);
    let watcher = Arc::clone(&running.watcher);

    assert_eq!(
        closed.recv_timeout(Duration::from_millis(50)),
        Err(RecvTimeoutError::Timeout)
    );

    running.stop();

    assert_eq!(closed.recv_timeout(TIMEOUT), Err(RecvTimeoutError::Disconnected));
    assert_eq!(events.recv_timeout(TIMEOUT), Err(RecvTimeoutError::Disconnected));
    assert!(watcher.is_closed());
    assert!(!watcher.is_running());
    assert!(watcher.watched_files().is_empty());

    // Close again is a no-op and the watcher cannot be restarted
    watcher.close();
    assert!(matches!(watcher.start(INTERVAL), Err(WatchError::Closed)));
    assert!(matches!(
        watcher.trigger_event(Op::Write, None),
        Err(WatchError::Closed)
    ));
    Ok(())
}

#[test]
fn test_close_unblocks_stalled_delivery() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let watcher = Watcher::new();
    watcher.add(temp_dir.path())?;
    let running = Running::spawn(watcher);

    // Nobody receives this event, so the loop blocks delivering it
    fs::write(temp_dir.path().join("pending"), b"p")?;
    thread::sleep(Duration::from_millis(100));

    running.stop();
    Ok(())
}

#[test]
fn test_trigger_event() -> Result<()> {
    let watcher = Arc::new(Watcher::new());
    let events = watcher.events();

    let trigger = {
        let watcher = Arc::clone(&watcher);
        thread::spawn(move || watcher.trigger_event(Op::Chmod, None))
    };
    let handle = {
        let watcher = Arc::clone(&watcher);
        thread::spawn(move || watcher.start(INTERVAL))
    };

    let event = events.recv_timeout(TIMEOUT)?;
    assert_eq!(event.op, Op::Chmod);
    assert_eq!(event.path, "-");
    assert_eq!(event.meta.name, "triggered event");
    trigger.join().unwrap()?;

    watcher.close();
    handle.join().unwrap()?;
    Ok(())
}
