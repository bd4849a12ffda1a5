use application::connect_session;
use infrastructure::SessionConfig;
use psu_cli::{Command, Overrides, execute};

async fn simulated_session() -> application::Instrument {
    let mut config = SessionConfig::default();
    Overrides {
        simulate: true,
        ..Overrides::default()
    }
    .apply(&mut config)
    .unwrap();
    connect_session(&config).await.unwrap()
}

#[tokio::test]
async fn test_list_shows_every_control() {
    let mut instrument = simulated_session().await;

    let output = execute(&mut instrument, &Command::List).await.unwrap();

    let names: Vec<&str> = output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    assert_eq!(names, vec!["current", "output", "power", "remote", "voltage"]);
}

#[tokio::test]
async fn test_set_then_get_voltage() {
    let mut instrument = simulated_session().await;

    let set = Command::Set {
        control: "voltage".to_string(),
        value: "42.5".to_string(),
    };
    assert_eq!(execute(&mut instrument, &set).await.unwrap(), "voltage = 42.5");

    let get = Command::Get {
        control: "voltage".to_string(),
    };
    assert_eq!(execute(&mut instrument, &get).await.unwrap(), "42.5");
}

#[tokio::test]
async fn test_set_reports_clamped_value() {
    let mut instrument = simulated_session().await;

    let set = Command::Set {
        control: "current".to_string(),
        value: "301".to_string(),
    };

    assert_eq!(execute(&mut instrument, &set).await.unwrap(), "current = 300");
}

#[tokio::test]
async fn test_errors_and_clear() {
    let mut instrument = simulated_session().await;
    execute(
        &mut instrument,
        &Command::Write {
            command: ":BOGUS".to_string(),
        },
    )
    .await
    .unwrap();

    let errors = execute(&mut instrument, &Command::Errors).await.unwrap();
    assert_eq!(errors, "-113 Undefined header");

    let cleared = execute(&mut instrument, &Command::Clear).await.unwrap();
    assert_eq!(cleared, "Device errors cleared");
    assert_eq!(
        execute(&mut instrument, &Command::Errors).await.unwrap(),
        "No device errors"
    );
}

#[tokio::test]
async fn test_invalid_value_is_an_error() {
    let mut instrument = simulated_session().await;

    let set = Command::Set {
        control: "output".to_string(),
        value: "blink".to_string(),
    };

    assert!(execute(&mut instrument, &set).await.is_err());
}

#[tokio::test]
async fn test_id_and_ask() {
    let mut instrument = simulated_session().await;

    let id = execute(&mut instrument, &Command::Id).await.unwrap();
    assert!(id.starts_with("EA Elektro-Automatik"));

    let reply = execute(
        &mut instrument,
        &Command::Ask {
            command: ":OUTP?".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(reply, "OFF");
}
