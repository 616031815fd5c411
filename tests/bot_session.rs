//! End-to-end session against a scripted server.
//!
//! Tests the complete flow of connecting, registering, answering the server
//! and shutting down when the server hangs up.

mod common;

use common::{FakeServer, test_config};
use relaybot::Bot;
use relaybot::config::Config;
use std::thread;

fn config_for(server: &FakeServer) -> Config {
    let mut config = test_config();
    config.server.address = server.address();
    config.server.channels = vec!["#test".to_string()];
    config
}

#[test]
fn test_full_session() {
    let server = FakeServer::bind();
    let bot = thread::spawn({
        let config = config_for(&server);
        move || Bot::new(config).run()
    });

    let mut session = server.accept();
    assert_eq!(session.expect("NICK"), "NICK relaybot");
    assert_eq!(session.expect("USER"), "USER relaybot 0 * :relaybot");

    session.send(":irc.test 001 relaybot :Welcome to the test network");
    assert_eq!(session.expect("JOIN"), "JOIN #test");

    session.send("PING :keepalive-1");
    assert_eq!(session.expect("PONG"), "PONG :keepalive-1");

    session.send(":alice!a@host PRIVMSG #test :!echo hello bot");
    assert_eq!(session.expect("PRIVMSG"), "PRIVMSG #test :hello bot");

    session.send(":alice!a@host PRIVMSG #test :!echo");
    assert_eq!(session.expect("NOTICE"), "NOTICE alice :usage: echo <text>");

    session.send(":alice!a@host PRIVMSG relaybot :\x01VERSION\x01");
    assert!(session.expect("NOTICE alice :\x01VERSION relaybot").ends_with('\x01'));

    session.hang_up();
    assert_eq!(session.expect("QUIT"), "QUIT :relaybot shutting down");
    assert_eq!(session.recv(), None);

    let lines = bot.join().expect("bot thread").expect("clean session");
    assert_eq!(lines, 5);
}

#[test]
fn test_nick_collision_retries_with_suffix() {
    let server = FakeServer::bind();
    let bot = thread::spawn({
        let config = config_for(&server);
        move || Bot::new(config).run()
    });

    let mut session = server.accept();
    session.expect("USER");
    session.send(":irc.test 433 * relaybot :Nickname is already in use");
    assert_eq!(session.expect("NICK"), "NICK relaybot_");

    session.send(":irc.test 001 relaybot_ :Welcome");
    assert_eq!(session.expect("JOIN"), "JOIN #test");

    session.hang_up();
    session.expect("QUIT");
    assert!(bot.join().expect("bot thread").is_ok());
}

#[test]
fn test_password_is_sent_first() {
    let server = FakeServer::bind();
    let bot = thread::spawn({
        let mut config = config_for(&server);
        config.server.password = Some("hunter2".to_string());
        move || Bot::new(config).run()
    });

    let mut session = server.accept();
    assert_eq!(session.recv().as_deref(), Some("PASS hunter2"));
    assert_eq!(session.recv().as_deref(), Some("NICK relaybot"));

    session.hang_up();
    session.expect("QUIT");
    assert!(bot.join().expect("bot thread").is_ok());
}

#[test]
fn test_unreachable_server_is_an_error() {
    let address = {
        let server = FakeServer::bind();
        server.address()
    };
    let mut config = test_config();
    config.server.address = address;
    assert!(Bot::new(config).run().is_err());
}
