//! Property-based tests for message ordering and roster reconciliation
//!
//! These tests verify the session invariants over arbitrary event sequences:
//! sequence numbers follow receipt order, the roster never contains the local
//! user, and the selected recipient is always online or unset.

use multichat_core::*;
use proptest::prelude::*;

/// Small alphabet so generated rosters collide with the local user and each other
fn arb_user() -> impl Strategy<Value = UserId> {
    prop::sample::select(vec!["alice", "bob", "carol", "dave", "erin"]).prop_map(UserId::from)
}

fn arb_roster() -> impl Strategy<Value = Vec<UserId>> {
    prop::collection::vec(arb_user(), 0..8)
}

fn arb_message() -> impl Strategy<Value = Message> {
    (arb_user(), "[a-z ]{0,20}", any::<bool>()).prop_map(|(from, text, forwarded)| Message {
        from,
        to: Recipient::User(UserId::from("alice")),
        text,
        forwarded,
        // Whatever arrives on the wire is overwritten locally
        sequence: 999,
    })
}

#[derive(Debug, Clone)]
enum Step {
    Roster(Vec<UserId>),
    Incoming(Message),
    Select(UserId),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        arb_roster().prop_map(Step::Roster),
        arb_message().prop_map(Step::Incoming),
        arb_user().prop_map(Step::Select),
    ]
}

fn connected_session(config: &ClientConfig) -> Session {
    let mut session = Session::new(config);
    session.apply(Action::ChangeUser("alice".into()), config);
    session.apply(Action::Connect, config);
    session.apply(Action::ConnectionChanged(true), config);
    session
}

proptest! {
    /// Property: N incoming messages produce N log entries numbered 0..N in receipt order
    #[test]
    fn sequence_follows_receipt_order(messages in prop::collection::vec(arb_message(), 0..50)) {
        let config = ClientConfig::default();
        let mut session = connected_session(&config);

        for message in &messages {
            session.apply(Action::MessageReceived(message.clone()), &config);
        }

        prop_assert_eq!(session.messages().len(), messages.len());
        for (i, (logged, sent)) in session.messages().iter().zip(&messages).enumerate() {
            prop_assert_eq!(logged.sequence, i as u64);
            prop_assert_eq!(&logged.text, &sent.text);
            prop_assert_eq!(&logged.from, &sent.from);
        }
    }

    /// Property: the roster never contains the local user
    #[test]
    fn roster_excludes_self(rosters in prop::collection::vec(arb_roster(), 1..10)) {
        let config = ClientConfig::default();
        let mut session = connected_session(&config);

        for roster in rosters {
            let expected: Vec<UserId> = roster
                .iter()
                .filter(|user| user.as_str() != "alice")
                .cloned()
                .collect();
            session.apply(Action::RosterUpdated(roster), &config);

            prop_assert!(!session.roster().contains(&UserId::from("alice")));
            for user in session.roster() {
                prop_assert!(expected.contains(user));
            }
        }
    }

    /// Property: after any roster update the recipient is unset or online
    #[test]
    fn recipient_is_never_stale(steps in prop::collection::vec(arb_step(), 1..40)) {
        let config = ClientConfig::default();
        let mut session = connected_session(&config);

        for step in steps {
            match step {
                Step::Roster(roster) => {
                    session.apply(Action::RosterUpdated(roster), &config);
                    if let Recipient::User(user) = session.recipient() {
                        prop_assert!(session.roster().contains(user));
                    }
                }
                Step::Incoming(message) => {
                    let before = session.messages().len();
                    session.apply(Action::MessageReceived(message), &config);
                    prop_assert_eq!(session.messages().len(), before + 1);
                }
                Step::Select(user) => {
                    if session.roster().contains(&user) {
                        session.apply(Action::ChangeRecipient(Recipient::User(user)), &config);
                    }
                }
            }
        }
    }
}
