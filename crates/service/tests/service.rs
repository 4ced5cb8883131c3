use std::sync::Arc;

use vsoa_codec::message::RpcMethod;
use vsoa_service::client::{Client, ClientTable};
use vsoa_service::router::RouteTable;

#[test]
fn rpc_resolution_prefers_exact_then_prefix() {
    let routes: RouteTable<&'static str, &'static str, &'static str> = RouteTable::new();
    routes
        .register_rpc(RpcMethod::Get, "/vehicle/speed", "speed-handler")
        .unwrap();
    routes
        .register_rpc(RpcMethod::Get, "/vehicle/", "vehicle-fallback")
        .unwrap();

    assert_eq!(
        *routes.resolve_rpc(RpcMethod::Get, "/vehicle/speed").unwrap(),
        "speed-handler"
    );
    assert_eq!(
        *routes.resolve_rpc(RpcMethod::Get, "/vehicle/brake").unwrap(),
        "vehicle-fallback"
    );
    assert!(routes.resolve_rpc(RpcMethod::Get, "/other").is_none());
}

#[test]
fn duplicate_registration_is_rejected() {
    let routes: RouteTable<&'static str, &'static str, &'static str> = RouteTable::new();
    routes.register_datagram("/x", "first").unwrap();
    let err = routes.register_datagram("/x", "second").unwrap_err();
    assert!(matches!(err, vsoa_service::Error::AlreadyRegistered));
}

#[test]
fn datagram_falls_back_to_default() {
    let routes: RouteTable<&'static str, &'static str, &'static str> = RouteTable::new();
    routes.register_datagram_default("default-handler").unwrap();
    assert_eq!(*routes.resolve_datagram("/unregistered").unwrap(), "default-handler");
}

#[test]
fn subscription_resolution_returns_effective_url() {
    let routes: RouteTable<&'static str, &'static str, &'static str> = RouteTable::new();
    routes.register_publish("/p/d/", false, "producer").unwrap();

    let (effective, meta) = routes.resolve_subscription("/p/d").unwrap();
    assert_eq!(effective, "/p/d/");
    assert!(!meta.raw_flag);
}

#[test]
fn client_table_snapshots_independent_of_live_removal() {
    let table: ClientTable<()> = ClientTable::new();
    let uid1 = table.next_uid();
    let uid2 = table.next_uid();
    let addr: std::net::SocketAddr = "127.0.0.1:9000".parse().unwrap();

    table.insert(Arc::new(Client::new(uid1, addr, ())));
    table.insert(Arc::new(Client::new(uid2, addr, ())));

    let snapshot = table.snapshot();
    table.remove(uid1);

    // the snapshot taken before the removal still has both entries
    assert_eq!(snapshot.len(), 2);
    assert_eq!(table.len(), 1);
}

#[test]
fn client_subscription_matches_hierarchical_prefix() {
    let client: Client<()> = Client::new(1, "127.0.0.1:9000".parse().unwrap(), ());
    client.subscribe("/p/");

    assert!(client.is_recipient_of("/p/d"));
    assert!(client.is_recipient_of("/p/d/e"));
    assert!(!client.is_recipient_of("/q"));
}
