use std::time::Duration;

use application::devices::ea_psb;
use application::{Instrument, SessionOptions};
use domain::{AdapterKind, InstrumentError, SessionState};
use infrastructure::AdapterFactory;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// SCPI peer that answers `:VOLT?` late and `:POW?` in two late fragments
async fn slow_psu() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve(socket));
        }
    });
    port
}

async fn serve(socket: TcpStream) {
    let mut lines = BufReader::new(socket);
    let mut line = String::new();
    while matches!(lines.read_line(&mut line).await, Ok(n) if n > 0) {
        let socket = lines.get_mut();
        // The client may have dropped this connection already
        let _ = match line.trim() {
            ":SYST:ERR?" => socket.write_all(b"0,\"No error\"\n").await,
            ":VOLT?" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                socket.write_all(b"42.5\n").await
            }
            ":POW?" => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = socket.write_all(b"1").await;
                tokio::time::sleep(Duration::from_millis(200)).await;
                socket.write_all(b"23\n").await
            }
            ":CURR?" => socket.write_all(b"7\n").await,
            _ => Ok(()),
        };
        line.clear();
    }
}

async fn connect(port: u16) -> Instrument {
    let adapter = AdapterFactory::create_adapter(
        AdapterKind::Tcp,
        json!({ "host": "127.0.0.1", "port": port }),
    )
    .unwrap();
    Instrument::connect(
        ea_psb::shared_model().unwrap(),
        adapter,
        SessionOptions {
            timeout: Some(Duration::from_millis(150)),
            ..SessionOptions::default()
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_late_reply_is_not_taken_for_next_query() {
    let mut instrument = connect(slow_psu().await).await;

    let voltage = instrument.get("voltage").await;
    assert!(matches!(
        voltage,
        Err(InstrumentError::Timeout { ref command, timeout_ms: 150 }) if command == ":VOLT?"
    ));

    // Let the late voltage reply land before asking for the current
    tokio::time::sleep(Duration::from_millis(250)).await;
    let current = instrument.get("current").await.unwrap();

    assert_eq!(current.as_f64(), Some(7.0));
    assert_eq!(instrument.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_fragmented_late_reply_is_discarded() {
    let mut instrument = connect(slow_psu().await).await;

    assert!(matches!(
        instrument.get("power").await,
        Err(InstrumentError::Timeout { .. })
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(instrument.get("current").await.unwrap().as_f64(), Some(7.0));
    assert_eq!(instrument.get("current").await.unwrap().as_f64(), Some(7.0));
}
