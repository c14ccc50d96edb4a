mod support;

use serde_json::json;

use busgate::wamp::uri;

#[tokio::test]
async fn binary_greets_and_hides_bus_procedures_before_auth() {
    let host = "127.0.0.1";
    let port = support::reserve_port(host);
    let mut child = support::spawn_busgate(host, port);

    support::wait_for_listen(host, port).await;

    let addr = format!("{host}:{port}").parse().unwrap();
    let mut client = support::Client::connect(addr).await;
    assert_eq!(client.session_id.len(), 16);

    let reply = client
        .call(uri::PROCEDURE_SEND, vec![json!(["session", "org.example", "/", "org.example.I", "M"])])
        .await;
    assert_eq!(reply[0], 4);
    assert_eq!(reply[2], uri::ERROR_NO_SUCH_RPC_ENDPOINT);

    let _ = child.kill();
    let _ = child.wait();
}
