#![cfg(unix)]

use std::path::Path;
use std::time::{Duration, Instant};

use xploit_recon::external::runner::{invoke, ExitClass, ScanInvocation};

#[tokio::test]
async fn missing_executable_is_not_found() {
    let inv = ScanInvocation::new("nmap-does-not-exist-4821", ["-sV", "127.0.0.1"], "127.0.0.1", Duration::from_secs(5));
    let out = invoke(&inv).await;
    assert_eq!(out.class, ExitClass::NotFound);
    assert!(out.stdout.is_empty());
    assert!(!out.class.has_output());
}

#[tokio::test]
async fn overrunning_process_is_killed() {
    let inv = ScanInvocation::new("sleep", ["30"], "local", Duration::from_millis(300));
    let start = Instant::now();
    let out = invoke(&inv).await;

    assert_eq!(out.class, ExitClass::TimedOut);
    assert!(start.elapsed() < Duration::from_secs(5));
    let pid = out.pid.expect("spawned process has a pid");
    // killed and reaped: no /proc entry remains
    assert!(!Path::new(&format!("/proc/{}", pid)).exists());
}

#[tokio::test]
async fn timeout_keeps_output_written_so_far() {
    let inv = ScanInvocation::new(
        "sh",
        ["-c", "echo 'Host is up'; echo '80/tcp open http'; exec sleep 30"],
        "local",
        Duration::from_millis(500),
    );
    let out = invoke(&inv).await;
    assert_eq!(out.class, ExitClass::TimedOut);
    assert!(out.stdout.contains("80/tcp open http"));
}

/// Gone, or a zombie nobody has reaped yet: either way no longer running.
fn is_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => {
            // state follows the parenthesised command name
            let state = stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next());
            !matches!(state, Some("Z") | Some("X"))
        }
        Err(_) => false,
    }
}

#[tokio::test]
async fn timeout_kills_processes_started_by_the_tool() {
    // the tool forks a worker that inherits stdout and outlives it
    let inv = ScanInvocation::new(
        "sh",
        ["-c", "echo partial-output; sleep 30 & echo $!; wait"],
        "local",
        Duration::from_millis(500),
    );
    let start = Instant::now();
    let out = invoke(&inv).await;

    assert_eq!(out.class, ExitClass::TimedOut);
    // pipes closed with the group, so no drain grace period was needed
    assert!(start.elapsed() < Duration::from_millis(1_900));
    let mut lines = out.stdout.lines();
    assert_eq!(lines.next(), Some("partial-output"));
    let worker: u32 = lines.next().expect("worker pid printed").parse().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while is_running(worker) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!is_running(worker), "worker {} survived the timeout", worker);
}

#[tokio::test]
async fn output_read_before_a_held_pipe_is_kept() {
    // a process outside the tool's group keeps stdout open after the tool exits
    let inv = ScanInvocation::new(
        "sh",
        ["-c", "echo '22/tcp open ssh'; setsid sleep 5 & exit 0"],
        "local",
        Duration::from_secs(10),
    );
    let out = invoke(&inv).await;
    assert_eq!(out.class, ExitClass::Success);
    assert_eq!(out.stdout, "22/tcp open ssh\n");
}

#[tokio::test]
async fn success_and_nonzero_are_distinguished() {
    let ok = invoke(&ScanInvocation::new("true", Vec::<String>::new(), "x", Duration::from_secs(5))).await;
    assert_eq!(ok.class, ExitClass::Success);

    let fail = invoke(&ScanInvocation::new("false", Vec::<String>::new(), "x", Duration::from_secs(5))).await;
    assert_eq!(fail.class, ExitClass::NonZeroExit);
    assert_eq!(fail.exit_code, Some(1));
}

#[tokio::test]
async fn non_executable_path_is_unexpected() {
    // a directory exists but cannot be executed
    let inv = ScanInvocation::new("/tmp", Vec::<String>::new(), "x", Duration::from_secs(5));
    let out = invoke(&inv).await;
    assert_eq!(out.class, ExitClass::Unexpected);
    assert!(out.error.is_some());
}
