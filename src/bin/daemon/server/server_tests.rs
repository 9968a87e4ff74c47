// Test suite for the server module
// Covers request validation, the command factory, response formatting, the
// request pipeline and the ROUTER dispatcher with real DEALER clients.

use serde_json::{Value, json};

use crate::error::CommandError;

fn validation_message(result: Result<(), CommandError>) -> String {
    match result {
        Err(CommandError::Validation(message)) => message,
        other => panic!("Expected Validation error, got {:?}", other),
    }
}

#[cfg(test)]
mod validator_tests {
    use super::*;
    use crate::server::validator::validate;

    #[test]
    fn test_valid_requests() {
        validate(&json!({"command_type": "compute", "expression": "2 + 2"})).unwrap();
        validate(&json!({"command_type": "os", "command_name": "ls"})).unwrap();
        validate(&json!({"command_type": "os", "command_name": "ls", "parameters": ["-l"]})).unwrap();
        validate(&json!({"command_type": "os", "command_name": "ls", "parameters": []})).unwrap();
    }

    #[test]
    fn test_not_an_object() {
        for request in [json!([1, 2]), json!("os"), json!(42), Value::Null] {
            assert_eq!(
                validation_message(validate(&request)),
                "Request must be a JSON object"
            );
        }
    }

    #[test]
    fn test_missing_command_type() {
        assert_eq!(
            validation_message(validate(&json!({"command_name": "ls"}))),
            "Missing 'command_type' in request"
        );
    }

    #[test]
    fn test_invalid_command_type() {
        assert_eq!(
            validation_message(validate(&json!({"command_type": "invalid_type"}))),
            "Invalid command_type: invalid_type"
        );
        assert_eq!(
            validation_message(validate(&json!({"command_type": 5}))),
            "Invalid command_type: 5"
        );
    }

    #[test]
    fn test_os_shape() {
        assert_eq!(
            validation_message(validate(&json!({"command_type": "os"}))),
            "Missing 'command_name' for OS command"
        );
        assert_eq!(
            validation_message(validate(&json!({"command_type": "os", "command_name": ["ls"]}))),
            "'command_name' must be a string"
        );
        assert_eq!(
            validation_message(validate(
                &json!({"command_type": "os", "command_name": "ls", "parameters": "-l"})
            )),
            "'parameters' must be a list"
        );
        assert_eq!(
            validation_message(validate(
                &json!({"command_type": "os", "command_name": "ls", "parameters": null})
            )),
            "'parameters' must be a list"
        );
        assert_eq!(
            validation_message(validate(
                &json!({"command_type": "os", "command_name": "ls", "parameters": ["-l", 3]})
            )),
            "'parameters' must be a list of strings"
        );
    }

    #[test]
    fn test_compute_shape() {
        assert_eq!(
            validation_message(validate(&json!({"command_type": "compute"}))),
            "Missing 'expression' for compute command"
        );
        assert_eq!(
            validation_message(validate(&json!({"command_type": "compute", "expression": 4}))),
            "'expression' must be a string"
        );
    }
}

#[cfg(test)]
mod command_factory_tests {
    use super::*;
    use crate::server::command_factory::create_command;
    use crate::server::commands::Command;

    #[test]
    fn test_create_os_command() {
        let request = json!({"command_type": "os", "command_name": "ls", "parameters": ["-l"]});
        match create_command(&request).unwrap() {
            Command::Os(command) => {
                assert_eq!(command.name(), "ls");
                assert_eq!(command.parameters(), ["-l".to_string()]);
            }
            other => panic!("Expected Os command, got {:?}", other),
        }
    }

    #[test]
    fn test_parameters_default_to_empty() {
        let request = json!({"command_type": "os", "command_name": "sleep"});
        match create_command(&request).unwrap() {
            Command::Os(command) => assert!(command.parameters().is_empty()),
            other => panic!("Expected Os command, got {:?}", other),
        }
    }

    #[test]
    fn test_create_compute_command() {
        let request = json!({"command_type": "compute", "expression": "2 + 2"});
        match create_command(&request).unwrap() {
            Command::Compute(command) => assert_eq!(command.expression(), "2 + 2"),
            other => panic!("Expected Compute command, got {:?}", other),
        }
    }

    /// The factory does not rely on the validator having run
    #[test]
    fn test_invalid_command_type() {
        match create_command(&json!({"command_type": "invalid"})) {
            Err(CommandError::Internal(detail)) => assert!(detail.contains("invalid")),
            other => panic!("Expected Internal error, got {:?}", other),
        }
        assert!(matches!(
            create_command(&json!({"command_type": "compute"})),
            Err(CommandError::Internal(_))
        ));
    }

    #[test]
    fn test_disallowed_os_command() {
        let request = json!({"command_type": "os", "command_name": "rm", "parameters": ["-rf"]});
        assert!(matches!(
            create_command(&request),
            Err(CommandError::Execution { .. })
        ));
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use crate::server::response_handler::{Response, format_response, internal_error_payload};

    fn parsed(payload: String) -> Value {
        serde_json::from_str(&payload).unwrap()
    }

    #[test]
    fn test_success_shapes() {
        let payload = format_response(Ok(Response::OsCommand {
            given_os_command: "ls -l".to_string(),
            result: "total 0".to_string(),
        }));
        assert_eq!(
            parsed(payload),
            json!({"given_os_command": "ls -l", "result": "total 0"})
        );

        let payload = format_response(Ok(Response::MathExpression {
            given_math_expression: "2 + 2".to_string(),
            result: "4".to_string(),
        }));
        assert_eq!(
            parsed(payload),
            json!({"given_math_expression": "2 + 2", "result": "4"})
        );
    }

    #[test]
    fn test_error_shapes() {
        let payload = format_response(Err(CommandError::Validation(
            "Missing 'command_type' in request".to_string(),
        )));
        assert_eq!(
            parsed(payload),
            json!({"error": "Missing 'command_type' in request", "command": null})
        );

        let payload = format_response(Err(CommandError::execution("Command 'rm' not allowed", "rm")));
        assert_eq!(
            parsed(payload),
            json!({"error": "Command 'rm' not allowed", "command": "rm"})
        );

        let json_error = serde_json::from_str::<Value>("nope").unwrap_err();
        let payload = format_response(Err(CommandError::InvalidJson(json_error)));
        assert_eq!(parsed(payload), json!({"error": "Invalid JSON format"}));
    }

    /// Internal detail never reaches the wire
    #[test]
    fn test_internal_error_is_generic() {
        let payload = format_response(Err(CommandError::Internal(
            "failed to run '/secret/path': permission denied".to_string(),
        )));
        assert!(!payload.contains("secret"));
        assert_eq!(parsed(payload.clone()), json!({"error": "Internal server error"}));
        assert_eq!(payload, internal_error_payload());
    }
}

#[cfg(test)]
mod command_handler_tests {
    use super::*;
    use crate::config::DEFAULT_MAX_MESSAGE_SIZE;
    use crate::error::CommandResult;
    use crate::server::command_handler::{handle_request, respond};
    use crate::server::response_handler::{Response, internal_error_payload};

    async fn handle(payload: &str) -> Value {
        let response = handle_request(payload.as_bytes(), DEFAULT_MAX_MESSAGE_SIZE).await;
        serde_json::from_str(&response).unwrap()
    }

    fn exploding_step() -> CommandResult<Response> {
        panic!("request unit failed")
    }

    fn exploding_step_with_detail(detail: &str) -> CommandResult<Response> {
        panic!("cannot read {}", detail)
    }

    /// A panic inside the pipeline becomes the generic internal error, never a crash
    #[async_std::test]
    async fn test_panicking_pipeline_answers_internal_error() {
        let response = respond(async { exploding_step() }).await;
        assert_eq!(response, internal_error_payload());

        let response = respond(async { exploding_step_with_detail("/secret/path") }).await;
        assert!(!response.contains("secret"));
        assert_eq!(response, r#"{"error":"Internal server error"}"#);
    }

    #[async_std::test]
    async fn test_respond_passes_results_through() {
        let response = respond(async {
            Ok::<_, CommandError>(Response::MathExpression {
                given_math_expression: "1 + 1".to_string(),
                result: "2".to_string(),
            })
        })
        .await;
        let response: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(response, json!({"given_math_expression": "1 + 1", "result": "2"}));
    }

    #[async_std::test]
    async fn test_handle_valid_os_request() {
        let response = handle(r#"{"command_type": "os", "command_name": "ls", "parameters": ["-l"]}"#).await;
        assert_eq!(response["given_os_command"], "ls -l");
        assert!(response.get("result").is_some());
    }

    #[async_std::test]
    async fn test_handle_valid_compute_request() {
        let response = handle(r#"{"command_type": "compute", "expression": "2 + 2"}"#).await;
        assert_eq!(response, json!({"given_math_expression": "2 + 2", "result": "4"}));
    }

    #[async_std::test]
    async fn test_handle_invalid_json() {
        for payload in ["invalid json", "{\"command_type\": ", ""] {
            assert_eq!(handle(payload).await, json!({"error": "Invalid JSON format"}));
        }

        let response = handle_request(&[0xff, 0xfe, 0x00], DEFAULT_MAX_MESSAGE_SIZE).await;
        assert_eq!(response, r#"{"error":"Invalid JSON format"}"#);
    }

    #[async_std::test]
    async fn test_handle_invalid_command_type() {
        let response = handle(r#"{"command_type": "invalid"}"#).await;
        assert_eq!(
            response,
            json!({"error": "Invalid command_type: invalid", "command": null})
        );
    }

    #[async_std::test]
    async fn test_handle_missing_command_type() {
        let response = handle(r#"{"expression": "2 + 2"}"#).await;
        assert_eq!(response["error"], "Missing 'command_type' in request");
    }

    #[async_std::test]
    async fn test_handle_disallowed_command() {
        let response = handle(r#"{"command_type": "os", "command_name": "rm", "parameters": ["-rf", "/"]}"#).await;
        assert_eq!(response, json!({"error": "Command 'rm' not allowed", "command": "rm"}));
    }

    #[async_std::test]
    async fn test_handle_unsafe_expression() {
        let response = handle(r#"{"command_type": "compute", "expression": "__import__('os')"}"#).await;
        assert!(response["error"]
            .as_str()
            .unwrap()
            .starts_with("Expression evaluation failed"));
        assert_eq!(response["command"], "__import__('os')");
    }

    #[async_std::test]
    async fn test_handle_oversized_message() {
        let payload = r#"{"command_type": "compute", "expression": "1 + 1"}"#;
        let response = handle_request(payload.as_bytes(), 16).await;
        let response: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(
            response["error"],
            format!("Message too large: {} bytes (max: 16)", payload.len())
        );
        assert_eq!(response["command"], Value::Null);
    }
}

#[cfg(test)]
mod dispatcher_tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use async_std::channel::{Sender, bounded};
    use async_std::future::timeout;
    use async_std::task::{self, JoinHandle};
    use bytes::Bytes;
    use zeromq::prelude::*;
    use zeromq::{DealerSocket, ZmqMessage};

    use crate::config::ServerConfig;
    use crate::error::DaemonError;
    use crate::server::server::{DaemonServer, ServerState, format_tag};

    const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

    struct RunningServer {
        endpoint: String,
        stop: Sender<()>,
        handle: JoinHandle<()>,
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        }
    }

    async fn start_server() -> RunningServer {
        let server = DaemonServer::bind(&test_config()).await.unwrap();
        assert_eq!(server.state(), ServerState::Running);
        let endpoint = server.endpoint().to_string();
        let (stop, stop_rx) = bounded(1);
        let handle = task::spawn(server.run(stop_rx));
        RunningServer {
            endpoint,
            stop,
            handle,
        }
    }

    async fn client(endpoint: &str) -> DealerSocket {
        let mut socket = DealerSocket::new();
        socket.connect(endpoint).await.unwrap();
        socket
    }

    async fn send_json(socket: &mut DealerSocket, request: Value) {
        socket
            .send(ZmqMessage::from(request.to_string()))
            .await
            .unwrap();
    }

    async fn recv_json(socket: &mut DealerSocket) -> Value {
        let reply = timeout(REPLY_TIMEOUT, socket.recv())
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert_eq!(reply.len(), 1, "DEALER should see only the payload frame");
        serde_json::from_slice(reply.get(0).unwrap()).unwrap()
    }

    async fn stop(server: RunningServer) {
        server.stop.send(()).await.unwrap();
        timeout(REPLY_TIMEOUT, server.handle)
            .await
            .expect("server did not stop");
    }

    #[test]
    fn test_format_tag_is_hex() {
        assert_eq!(format_tag(&[0x00, 0xab, 0x10]), "00ab10");
        assert_eq!(format_tag(&[]), "");
    }

    #[async_std::test]
    async fn test_bind_failure_is_fatal() {
        let first = DaemonServer::bind(&test_config()).await.unwrap();
        let port: u16 = first
            .endpoint()
            .rsplit(':')
            .next()
            .and_then(|port| port.parse().ok())
            .unwrap();

        let taken = ServerConfig {
            port,
            ..ServerConfig::default()
        };
        assert!(matches!(
            DaemonServer::bind(&taken).await,
            Err(DaemonError::Bind { .. })
        ));
    }

    #[async_std::test]
    async fn test_round_trip_compute_and_os() {
        let server = start_server().await;
        let mut socket = client(&server.endpoint).await;

        send_json(&mut socket, json!({"command_type": "compute", "expression": "(30 + 10) * 5 + 1"})).await;
        assert_eq!(
            recv_json(&mut socket).await,
            json!({"given_math_expression": "(30 + 10) * 5 + 1", "result": "201"})
        );

        send_json(&mut socket, json!({"command_type": "os", "command_name": "ls", "parameters": ["-l"]})).await;
        let response = recv_json(&mut socket).await;
        assert_eq!(response["given_os_command"], "ls -l");
        assert!(response.get("result").is_some());

        stop(server).await;
    }

    #[async_std::test]
    async fn test_errors_are_answered_and_server_keeps_serving() {
        let server = start_server().await;
        let mut socket = client(&server.endpoint).await;

        socket.send(ZmqMessage::from("not json")).await.unwrap();
        assert_eq!(recv_json(&mut socket).await, json!({"error": "Invalid JSON format"}));

        send_json(&mut socket, json!({"expression": "1"})).await;
        assert_eq!(
            recv_json(&mut socket).await,
            json!({"error": "Missing 'command_type' in request", "command": null})
        );

        send_json(&mut socket, json!({"command_type": "os", "command_name": "rm"})).await;
        assert_eq!(
            recv_json(&mut socket).await,
            json!({"error": "Command 'rm' not allowed", "command": "rm"})
        );

        send_json(&mut socket, json!({"command_type": "compute", "expression": "2 + 2"})).await;
        assert_eq!(recv_json(&mut socket).await["result"], "4");

        stop(server).await;
    }

    /// Messages that are not exactly [tag, payload] get no reply and do not stop the loop
    #[async_std::test]
    async fn test_malformed_frame_count_is_skipped() {
        let server = start_server().await;
        let mut socket = client(&server.endpoint).await;

        let mut malformed = ZmqMessage::from(json!({"command_type": "compute", "expression": "1 + 1"}).to_string());
        malformed.push_front(Bytes::new());
        socket.send(malformed).await.unwrap();

        send_json(&mut socket, json!({"command_type": "compute", "expression": "3 * 3"})).await;
        assert_eq!(
            recv_json(&mut socket).await,
            json!({"given_math_expression": "3 * 3", "result": "9"})
        );

        stop(server).await;
    }

    /// Each client gets exactly one reply, carrying its own result
    #[async_std::test]
    async fn test_concurrent_clients_are_routed_by_tag() {
        let server = start_server().await;
        const CLIENTS: i64 = 16;

        let mut tasks = Vec::new();
        for i in 0..CLIENTS {
            let endpoint = server.endpoint.clone();
            tasks.push(task::spawn(async move {
                let mut socket = client(&endpoint).await;
                let expression = format!("{} * 1000 + 7", i);
                send_json(&mut socket, json!({"command_type": "compute", "expression": expression})).await;
                let response = recv_json(&mut socket).await;

                // No second reply may follow
                let extra = timeout(Duration::from_millis(200), socket.recv()).await;
                assert!(extra.is_err(), "client {} got a duplicate reply", i);
                (i, response)
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            let (i, response) = task.await;
            assert_eq!(response["given_math_expression"], format!("{} * 1000 + 7", i));
            assert_eq!(response["result"], (i * 1000 + 7).to_string());
            assert!(seen.insert(i));
        }
        assert_eq!(seen.len(), CLIENTS as usize);

        stop(server).await;
    }

    /// A slow command does not hold up a fast one submitted after it
    #[async_std::test]
    async fn test_slow_command_does_not_block_others() {
        let server = start_server().await;
        let mut slow = client(&server.endpoint).await;
        let mut fast = client(&server.endpoint).await;

        send_json(&mut slow, json!({"command_type": "os", "command_name": "sleep", "parameters": ["2"]})).await;
        task::sleep(Duration::from_millis(100)).await;

        send_json(&mut fast, json!({"command_type": "compute", "expression": "2 + 2"})).await;
        let fast_reply = timeout(Duration::from_secs(1), fast.recv()).await;
        assert!(fast_reply.is_ok(), "fast request waited for the slow one");

        assert_eq!(
            recv_json(&mut slow).await,
            json!({"given_os_command": "sleep 2", "result": ""})
        );

        stop(server).await;
    }

    /// After a stop request in-flight work is still answered, then the socket closes
    #[async_std::test]
    async fn test_shutdown_drains_in_flight_requests() {
        let server = start_server().await;
        let mut socket = client(&server.endpoint).await;

        send_json(&mut socket, json!({"command_type": "os", "command_name": "sleep", "parameters": ["1"]})).await;
        task::sleep(Duration::from_millis(300)).await;

        server.stop.send(()).await.unwrap();
        assert_eq!(
            recv_json(&mut socket).await,
            json!({"given_os_command": "sleep 1", "result": ""})
        );
        timeout(REPLY_TIMEOUT, server.handle)
            .await
            .expect("server did not stop after draining");

        // Nothing answers once the dispatcher is gone
        let request = json!({"command_type": "compute", "expression": "1 + 1"}).to_string();
        let _ = timeout(Duration::from_millis(500), socket.send(ZmqMessage::from(request))).await;
        let late = timeout(Duration::from_millis(500), socket.recv()).await;
        assert!(late.is_err(), "request after shutdown was answered");
    }

    /// Failing units do not cut the drain short, and nothing sent after the stop is accepted
    #[async_std::test]
    async fn test_drain_answers_failures_and_refuses_new_requests() {
        let server = start_server().await;
        let mut slow = client(&server.endpoint).await;
        let mut missing_path = client(&server.endpoint).await;
        let mut bad_duration = client(&server.endpoint).await;
        let mut bad_expression = client(&server.endpoint).await;

        send_json(&mut slow, json!({"command_type": "os", "command_name": "sleep", "parameters": ["1"]})).await;
        send_json(
            &mut missing_path,
            json!({"command_type": "os", "command_name": "ls", "parameters": ["/definitely/not/a/real/path"]}),
        )
        .await;
        send_json(&mut bad_duration, json!({"command_type": "os", "command_name": "sleep", "parameters": ["abc"]})).await;
        send_json(&mut bad_expression, json!({"command_type": "compute", "expression": "1 / 0"})).await;
        task::sleep(Duration::from_millis(200)).await;

        server.stop.send(()).await.unwrap();
        task::sleep(Duration::from_millis(100)).await;

        // Still draining: the sleep above has most of its second left
        let mut late = client(&server.endpoint).await;
        send_json(&mut late, json!({"command_type": "compute", "expression": "1 + 1"})).await;

        let response = recv_json(&mut missing_path).await;
        assert!(response["error"].as_str().unwrap().starts_with("Command failed: "));
        assert_eq!(response["command"], "ls /definitely/not/a/real/path");

        let response = recv_json(&mut bad_duration).await;
        assert!(response["error"].as_str().unwrap().starts_with("Command failed: "));
        assert_eq!(response["command"], "sleep abc");

        assert_eq!(
            recv_json(&mut bad_expression).await,
            json!({"error": "Expression evaluation failed: division by zero", "command": "1 / 0"})
        );
        assert_eq!(
            recv_json(&mut slow).await,
            json!({"given_os_command": "sleep 1", "result": ""})
        );

        timeout(REPLY_TIMEOUT, server.handle)
            .await
            .expect("server did not stop after draining");

        // Exactly one reply each, and none for the request sent while draining
        for socket in [&mut slow, &mut missing_path, &mut bad_duration, &mut bad_expression, &mut late] {
            let extra = timeout(Duration::from_millis(300), socket.recv()).await;
            assert!(extra.is_err(), "unexpected reply after drain");
        }
    }

    /// Dropping every stop sender is also a stop request
    #[async_std::test]
    async fn test_closed_shutdown_channel_stops_server() {
        let RunningServer { stop, handle, .. } = start_server().await;
        drop(stop);
        timeout(REPLY_TIMEOUT, handle)
            .await
            .expect("server did not stop");
    }
}
