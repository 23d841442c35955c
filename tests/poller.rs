use pollserve::error::RegistrationError;
use pollserve::reactor::event::{Events, Interest};
use pollserve::reactor::poller::Poller;
use std::io::Write;
use std::net::{TcpListener as StdTcpListener, TcpStream as StdTcpStream};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

#[test]
fn wait_without_events_returns_empty_after_timeout() {
    let poller = Poller::new(1).expect("poller");
    let mut events = Events::with_capacity(8);

    let start = Instant::now();
    let n = poller
        .wait(&mut events, Duration::from_millis(50))
        .expect("wait");
    let elapsed = start.elapsed();

    assert_eq!(n, 0);
    assert!(events.is_empty());
    assert!(elapsed >= Duration::from_millis(45), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");
}

#[test]
fn listener_becomes_readable_on_connect() {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
    let mut poller = Poller::new(2).expect("poller");
    poller
        .register(listener.as_raw_fd(), Interest::READABLE)
        .expect("register");

    let _client = StdTcpStream::connect(listener.local_addr().unwrap()).expect("connect");

    let mut events = Events::with_capacity(4);
    let n = poller
        .wait(&mut events, Duration::from_secs(5))
        .expect("wait");

    assert_eq!(n, 1);
    let event = events.iter().next().expect("event");
    assert_eq!(event.fd(), listener.as_raw_fd());
    assert!(event.is_readable());
    assert!(!event.is_writable());
}

#[test]
fn empty_interest_silences_readiness() {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
    let (mut client, server_side) = {
        let client = StdTcpStream::connect(listener.local_addr().unwrap()).expect("connect");
        let (server_side, _) = listener.accept().expect("accept");
        (client, server_side)
    };
    client.write_all(b"data").expect("write");

    let mut poller = Poller::new(1).expect("poller");
    let fd = server_side.as_raw_fd();
    poller.register(fd, Interest::NONE).expect("register");

    let mut events = Events::with_capacity(4);
    let n = poller
        .wait(&mut events, Duration::from_millis(20))
        .expect("wait");
    assert_eq!(n, 0);
    assert!(poller.is_registered(fd));

    poller.register(fd, Interest::READABLE).expect("update");
    let n = poller
        .wait(&mut events, Duration::from_secs(5))
        .expect("wait");
    assert_eq!(n, 1);
}

#[test]
fn deregistration_is_symmetric() {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
    let fd = listener.as_raw_fd();
    let mut poller = Poller::new(1).expect("poller");

    assert!(matches!(
        poller.deregister(fd),
        Err(RegistrationError::NotRegistered(_))
    ));

    poller.register(fd, Interest::READABLE).expect("register");
    poller.deregister(fd).expect("deregister");

    assert!(matches!(
        poller.deregister(fd),
        Err(RegistrationError::NotRegistered(_))
    ));
    assert_eq!(poller.registered_count(), 0);
}
