// HTTP client tests against a mock API server
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use vmpanel::command::ApiRequest;
use vmpanel::config::{ApiConfig, AuthConfig};
use vmpanel::{
    ApiClient, ClusterWorkspace, HttpApiClient, PanelError, Selection, VmCommand, VmIdentity, VmStatus,
    Workspace,
};

fn identity() -> VmIdentity {
    VmIdentity::from_selection(&Selection::new("pve1", 100)).unwrap()
}

fn api_config(server: &Server, auth: Option<AuthConfig>) -> ApiConfig {
    ApiConfig {
        base_url: format!("{}/api2/json", server.url()),
        auth,
        ..ApiConfig::default()
    }
}

fn token_auth() -> Option<AuthConfig> {
    Some(AuthConfig::Token {
        user: "root@pam".into(),
        token_id: "panel".into(),
        secret: "s3cret".into(),
    })
}

#[tokio::test]
async fn test_status_read_with_token() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api2/json/nodes/pve1/qemu/100/status/current")
        .match_header("authorization", "PVEAPIToken=root@pam!panel=s3cret")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": {
                    "status": "running",
                    "qmpstatus": "running",
                    "name": "web",
                    "cpus": 2,
                    "maxmem": 2147483648u64,
                    "uptime": 4242
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let api = HttpApiClient::new(&api_config(&server, token_auth())).unwrap();
    let record = vmpanel::api::fetch_status(&api, &identity()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(record.vm_status(), VmStatus::Running);
    assert_eq!(record.name.as_deref(), Some("web"));
    assert_eq!(record.uptime, Some(4242));
}

#[tokio::test]
async fn test_stop_posts_form_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api2/json/nodes/pve1/qemu/100/status/stop")
        .match_body(Matcher::UrlEncoded("timeout".into(), "30".into()))
        .with_status(200)
        .with_body(r#"{"data":"UPID:pve1:0000:qmstop:100:root@pam:"}"#)
        .create_async()
        .await;

    let api = HttpApiClient::new(&api_config(&server, token_auth())).unwrap();
    let request = VmCommand::stop(Some(30)).to_request(&identity());
    let data = api.send(&request).await.unwrap();

    mock.assert_async().await;
    assert!(data.as_str().unwrap_or_default().starts_with("UPID:"));
}

#[tokio::test]
async fn test_error_response_carries_status_text() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api2/json/nodes/pve1/qemu/100/status/reset")
        .with_status(500)
        .with_body(r#"{"data":null,"message":"VM 100 not running\n"}"#)
        .create_async()
        .await;

    let api = HttpApiClient::new(&api_config(&server, token_auth())).unwrap();
    let err = api
        .send(&VmCommand::reset().to_request(&identity()))
        .await
        .unwrap_err();

    match &err {
        PanelError::Api { status, .. } => assert_eq!(*status, 500),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.status_text(), "500 Internal Server Error: VM 100 not running");
}

#[tokio::test]
async fn test_ticket_login_then_delete_with_csrf() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/api2/json/access/ticket")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("username".into(), "root@pam".into()),
            Matcher::UrlEncoded("password".into(), "hunter2".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "data": {
                    "ticket": "PVE:root@pam:TICKET",
                    "CSRFPreventionToken": "CSRF123",
                    "username": "root@pam"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let remove = server
        .mock("DELETE", "/api2/json/nodes/pve1/qemu/100")
        .match_header("cookie", "PVEAuthCookie=PVE:root@pam:TICKET")
        .match_header("csrfpreventiontoken", "CSRF123")
        .with_status(200)
        .with_body(r#"{"data":"UPID:pve1:0000:qmdestroy:100:root@pam:"}"#)
        .create_async()
        .await;

    let auth = Some(AuthConfig::Ticket {
        username: Some("root@pam".into()),
        password: Some("hunter2".into()),
        ticket: None,
        csrf_token: None,
    });
    let api = HttpApiClient::connect(&api_config(&server, auth)).await.unwrap();
    api.send(&VmCommand::remove().to_request(&identity()))
        .await
        .unwrap();

    login.assert_async().await;
    remove.assert_async().await;
}

#[tokio::test]
async fn test_failed_login_is_auth_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api2/json/access/ticket")
        .with_status(401)
        .create_async()
        .await;

    let auth = Some(AuthConfig::Ticket {
        username: Some("root@pam".into()),
        password: Some("wrong".into()),
        ticket: None,
        csrf_token: None,
    });
    let result = HttpApiClient::connect(&api_config(&server, auth)).await;
    assert!(matches!(result, Err(PanelError::Auth(_))));
}

#[tokio::test]
async fn test_get_sends_params_as_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api2/json/cluster/resources")
        .match_query(Matcher::UrlEncoded("type".into(), "vm".into()))
        .with_status(200)
        .with_body(r#"{"data":[{"vmid":100,"node":"pve2","type":"qemu"}]}"#)
        .create_async()
        .await;

    let api = HttpApiClient::new(&api_config(&server, None)).unwrap();
    let mut request = ApiRequest::get("/cluster/resources");
    request.params.push(("type".into(), "vm".into()));
    let data = api.send(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(data[0]["node"], "pve2");
}

#[tokio::test]
async fn test_migration_check_records_relocation() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api2/json/cluster/resources")
        .match_query(Matcher::UrlEncoded("type".into(), "vm".into()))
        .with_status(200)
        .with_body(
            json!({
                "data": [
                    { "vmid": 100, "node": "pve2", "type": "qemu", "name": "web" },
                    { "vmid": 101, "node": "pve1", "type": "lxc" }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(&api_config(&server, None)).unwrap());
    let workspace = ClusterWorkspace::new(api, Handle::current(), server.url());
    workspace.check_vm_migration(&Selection::new("pve1", 100));

    let mut moved = None;
    for _ in 0..100 {
        moved = workspace.take_relocation(100);
        if moved.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let moved = moved.expect("relocation recorded");
    assert_eq!(moved.node.as_deref(), Some("pve2"));
    assert_eq!(moved.vmid, Some(100));
    assert_eq!(moved.name.as_deref(), Some("web"));
}

async fn wait_for_lookup(workspace: &ClusterWorkspace, vmid: u32) {
    for _ in 0..100 {
        if !workspace.is_checking(vmid) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("lookup for VM {} did not finish", vmid);
}

#[tokio::test]
async fn test_relocations_are_tracked_per_vm() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api2/json/cluster/resources")
        .match_query(Matcher::UrlEncoded("type".into(), "vm".into()))
        .with_status(200)
        .with_body(
            json!({
                "data": [
                    { "vmid": 100, "node": "pve2", "type": "qemu" },
                    { "vmid": 200, "node": "pve3", "type": "qemu" }
                ]
            })
            .to_string(),
        )
        .expect_at_least(2)
        .create_async()
        .await;

    let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(&api_config(&server, None)).unwrap());
    let workspace = ClusterWorkspace::new(api, Handle::current(), server.url());

    // A running lookup for one VM must not swallow another VM's check.
    workspace.check_vm_migration(&Selection::new("pve1", 100));
    workspace.check_vm_migration(&Selection::new("pve1", 200));
    assert!(workspace.is_checking(100));
    assert!(workspace.is_checking(200));

    wait_for_lookup(&workspace, 100).await;
    wait_for_lookup(&workspace, 200).await;

    // The panel now showing VM 200 only follows VM 200.
    let moved = workspace.take_relocation(200).expect("VM 200 relocation");
    assert_eq!(moved.node.as_deref(), Some("pve3"));
    assert!(workspace.take_relocation(200).is_none());

    workspace.clear_relocations();
    assert!(workspace.take_relocation(100).is_none());
}

#[tokio::test]
async fn test_lookup_for_closed_panel_is_not_followed() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api2/json/cluster/resources")
        .match_query(Matcher::UrlEncoded("type".into(), "vm".into()))
        .with_status(200)
        .with_body(r#"{"data":[{"vmid":100,"node":"pve2","type":"qemu"}]}"#)
        .create_async()
        .await;

    let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(&api_config(&server, None)).unwrap());
    let workspace = ClusterWorkspace::new(api, Handle::current(), server.url());

    workspace.check_vm_migration(&Selection::new("pve1", 100));
    wait_for_lookup(&workspace, 100).await;

    assert!(workspace.take_relocation(200).is_none());
    assert_eq!(
        workspace
            .take_relocation(100)
            .and_then(|moved| moved.node),
        Some("pve2".to_string())
    );
}
