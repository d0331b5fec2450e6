use std::time::Duration;

use discovery::config::DiscoveryConfig;
use discovery::{receiver, sender};
use tokio::net::UdpSocket;

#[tokio::test]
async fn sender_discovers_and_chooses_a_single_receiver() {
    let discovery_port = 0; // bind to an ephemeral port; we talk to each other directly, not via broadcast
    let receiver_discovery_sock = UdpSocket::bind(("127.0.0.1", discovery_port))
        .await
        .unwrap();
    let receiver_addr = receiver_discovery_sock.local_addr().unwrap();

    let sender_sock = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();

    let config = DiscoveryConfig {
        port: receiver_addr.port(),
        window: Duration::from_millis(200),
    };

    let receiver_task = tokio::spawn(async move {
        receiver::respond_until_chosen(&receiver_discovery_sock, "test-device", 40001).await
    });

    let devices = sender::discover_receivers(&sender_sock, receiver_addr, &config)
        .await
        .unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "test-device");
    assert_eq!(devices[0].data_port, 40001);

    sender::send_chosen(&sender_sock, &devices[0], receiver_addr.port())
        .await
        .unwrap();

    let chosen_from = receiver_task.await.unwrap().unwrap();
    assert_eq!(chosen_from.ip(), sender_sock.local_addr().unwrap().ip());
}

#[tokio::test]
async fn discovery_window_closes_empty_when_nobody_replies() {
    let sender_sock = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
    let unused_receiver = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
    let target = unused_receiver.local_addr().unwrap();
    drop(unused_receiver); // nobody is listening anymore

    let config = DiscoveryConfig {
        port: target.port(),
        window: Duration::from_millis(50),
    };
    let devices = sender::discover_receivers(&sender_sock, target, &config)
        .await
        .unwrap();
    assert!(devices.is_empty());
}
