use super::*;
use crate::config::RealtimeConfig;
use crate::state::test_helpers::{assert_no_event, connect, recv_event, test_app_state};
use crate::store::memory::MemoryStore;
use protocol::ErrorNotice;
use uuid::Uuid;

#[tokio::test]
async fn join_parses_board_id_and_adds_member() {
    let state = test_app_state();
    let (conn, _rx) = connect(&state).await;
    let board_id = Uuid::new_v4();

    let joined = join(&state, conn, &board_id.to_string()).await.unwrap();
    assert_eq!(joined, board_id);
    assert!(state.registry.read().await.rooms_of(conn).contains(&board_id));

    // Second join is a no-op.
    join(&state, conn, &board_id.to_string()).await.unwrap();
    assert_eq!(state.registry.read().await.members(board_id).len(), 1);
}

#[tokio::test]
async fn join_rejects_malformed_board_id() {
    let state = test_app_state();
    let (conn, _rx) = connect(&state).await;

    let err = join(&state, conn, "42").await.unwrap_err();
    assert_eq!(err.error_code(), "E_VALIDATION");
    assert!(state.registry.read().await.rooms_of(conn).is_empty());
}

#[tokio::test]
async fn leave_is_idempotent() {
    let state = test_app_state();
    let (conn, _rx) = connect(&state).await;
    let board_id = Uuid::new_v4();
    let raw = board_id.to_string();

    join(&state, conn, &raw).await.unwrap();
    leave(&state, conn, &raw).await.unwrap();
    leave(&state, conn, &raw).await.unwrap();
    assert!(!state.registry.read().await.rooms_of(conn).contains(&board_id));
}

#[tokio::test]
async fn broadcast_reaches_members_only() {
    let state = test_app_state();
    let (a, mut rx_a) = connect(&state).await;
    let (b, mut rx_b) = connect(&state).await;
    let (_outsider, mut rx_out) = connect(&state).await;
    let board_id = Uuid::new_v4();
    join(&state, a, &board_id.to_string()).await.unwrap();
    join(&state, b, &board_id.to_string()).await.unwrap();

    let event = ServerEvent::Error(ErrorNotice::new("ping"));
    assert_eq!(broadcast(&state, board_id, event.clone(), Some(a)).await, 1);

    assert_eq!(recv_event(&mut rx_b).await, event);
    assert_no_event(&mut rx_a).await;
    assert_no_event(&mut rx_out).await;
}

#[tokio::test]
async fn send_to_reaches_one_connection() {
    let state = test_app_state();
    let (a, mut rx_a) = connect(&state).await;
    let (_b, mut rx_b) = connect(&state).await;

    let event = ServerEvent::Error(ErrorNotice::new("only you"));
    assert!(send_to(&state, a, event.clone()).await);
    assert_eq!(recv_event(&mut rx_a).await, event);
    assert_no_event(&mut rx_b).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_broadcasts_arrive_in_one_order_for_every_member() {
    const MEMBERS: usize = 32;
    const SENDERS: usize = 4;
    const PER_SENDER: usize = 250;

    let config = RealtimeConfig { client_channel_capacity: SENDERS * PER_SENDER + 16, ..RealtimeConfig::default() };
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    let board_id = Uuid::new_v4();
    let mut receivers = Vec::with_capacity(MEMBERS);
    for _ in 0..MEMBERS {
        let (conn, rx) = connect(&state).await;
        join(&state, conn, &board_id.to_string()).await.unwrap();
        receivers.push(rx);
    }

    let senders: Vec<_> = (0..SENDERS)
        .map(|sender| {
            let state = state.clone();
            tokio::spawn(async move {
                for seq in 0..PER_SENDER {
                    let event = ServerEvent::Error(ErrorNotice::new(format!("{sender}:{seq}")));
                    assert_eq!(broadcast(&state, board_id, event, None).await, MEMBERS);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for sender in senders {
        sender.await.unwrap();
    }

    let mut orders = Vec::with_capacity(MEMBERS);
    for rx in &mut receivers {
        let mut seen = Vec::with_capacity(SENDERS * PER_SENDER);
        while let Ok(event) = rx.try_recv() {
            match &*event {
                ServerEvent::Error(notice) => seen.push(notice.message.clone()),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(seen.len(), SENDERS * PER_SENDER);
        orders.push(seen);
    }
    assert!(orders.iter().all(|order| *order == orders[0]), "members observed different broadcast orders");
}
