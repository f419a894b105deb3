//! SIM, security profile, network and packet data workflows.

mod support;

use std::time::Duration;

use sara_at::{
    AtError, CertValidation, Command, Expect, OperatorSelection, RadioTechnology, Response,
    TlsVersion,
};
use sara_cellular::{Apn, CellInfo, CellularError, Clock, ModemConfig};
use support::Rig;

const NETWORK_TIMEOUT: Duration = Duration::from_secs(180);

fn imsi_reply(rig: &Rig, identity: &str) {
    rig.channel
        .reply(Expect::Imsi, Ok(Response::Imsi(identity.to_string())));
}

// ============================================================================
// SIM
// ============================================================================

#[test]
fn test_check_sim_retries_zero_identity() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();

    for _ in 0..5 {
        imsi_reply(&rig, "000000000000000");
        rig.channel.reply_ok();
    }
    imsi_reply(&rig, "234150123456789");
    rig.channel.reply_ok();

    let imsi = modem.check_sim().unwrap();

    assert_eq!(imsi.as_str(), "234150123456789");
    assert_eq!(rig.channel.count(&Command::RequestImsi), 6);
    assert_eq!(rig.clock.delays(), vec![Duration::from_millis(100); 5]);
}

#[test]
fn test_check_sim_gives_up_after_attempt_budget() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();

    for _ in 0..25 {
        imsi_reply(&rig, "000000000000000");
        rig.channel.reply_ok();
    }

    assert_eq!(modem.check_sim(), Err(CellularError::Timeout));
    assert_eq!(rig.channel.count(&Command::RequestImsi), 20);
}

#[test]
fn test_check_sim_retries_timeout_and_garbage() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();

    rig.channel.reply(Expect::Imsi, Err(AtError::Timeout));
    imsi_reply(&rig, "SIM BUSY");
    imsi_reply(&rig, "310150123456789");
    rig.channel.reply_ok();

    let imsi = modem.check_sim().unwrap();
    assert_eq!(imsi.to_string(), "310150123456789");
    assert_eq!(rig.channel.count(&Command::RequestImsi), 3);
    assert_eq!(rig.channel.pending_replies(), 0);
}

#[test]
fn test_check_sim_module_error_is_not_retried() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();

    rig.channel.reply(Expect::Imsi, Err(AtError::Cme(10)));

    assert!(matches!(
        modem.check_sim(),
        Err(CellularError::UnexpectedResponse(_))
    ));
    assert_eq!(rig.channel.count(&Command::RequestImsi), 1);
}

#[test]
fn test_check_sim_missing_ok_after_identity() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();

    imsi_reply(&rig, "310150123456789");
    rig.channel.reply(Expect::Ok, Err(AtError::Error));

    assert!(matches!(
        modem.check_sim(),
        Err(CellularError::UnexpectedResponse(_))
    ));
    assert_eq!(rig.channel.count(&Command::RequestImsi), 1);
}

#[test]
fn test_check_sim_attempts_follow_config() {
    let rig = Rig::new();
    let config = ModemConfig {
        imsi_attempts: 3,
        ..Default::default()
    };
    let mut modem = rig.modem_with(config);
    modem.power_on().unwrap();
    rig.channel.reply_ok();

    assert_eq!(modem.check_sim(), Err(CellularError::Timeout));
    assert_eq!(rig.channel.count(&Command::RequestImsi), 3);
}

// ============================================================================
// Security Profile
// ============================================================================

#[test]
fn test_secure_profile_steps_in_order() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    for _ in 0..6 {
        rig.channel.reply_ok();
    }

    modem.create_secure_profile().unwrap();

    assert_eq!(
        rig.channel.commands(),
        vec![
            Command::ResetSecurityProfile,
            Command::SetCertValidation(CertValidation::None),
            Command::SetMinTlsVersion(TlsVersion::Tls12),
            Command::SetRootCertificate {
                name: "root-CA.pem".to_string()
            },
            Command::SetClientCertificate {
                name: "deviceCert.pem".to_string()
            },
            Command::SetClientKey {
                name: "deviceCert.key".to_string()
            },
        ]
    );
    assert_eq!(rig.channel.flushes(), 6);
}

#[test]
fn test_secure_profile_stops_at_failed_step() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel
        .reply_ok()
        .reply_ok()
        .reply(Expect::Ok, Err(AtError::Cme(4)));
    for _ in 0..3 {
        rig.channel.reply_ok();
    }

    assert!(matches!(
        modem.create_secure_profile(),
        Err(CellularError::UnexpectedResponse(_))
    ));
    assert_eq!(rig.channel.commands().len(), 3);
    assert_eq!(rig.channel.pending_replies(), 3);
}

#[test]
fn test_secure_profile_uses_configured_credentials() {
    let rig = Rig::new();
    let mut config = ModemConfig::default();
    config.credentials.root_ca = "amazon-root.pem".to_string();
    let mut modem = rig.modem_with(config);
    modem.power_on().unwrap();
    for _ in 0..7 {
        rig.channel.reply_ok();
    }

    modem.create_secure_profile().unwrap();

    assert_eq!(
        rig.channel.count(&Command::SetRootCertificate {
            name: "amazon-root.pem".to_string()
        }),
        1
    );
}

// ============================================================================
// Network
// ============================================================================

#[test]
fn test_set_radio_technology() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel.reply_ok();

    modem
        .set_radio_technology(NETWORK_TIMEOUT, RadioTechnology::Automatic)
        .unwrap();

    assert_eq!(
        rig.channel.commands(),
        vec![Command::SelectRadioTechnology(RadioTechnology::Automatic)]
    );
}

#[test]
fn test_scan_timeout_sends_one_abort() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();

    assert_eq!(
        modem.scan(Duration::from_secs(30)),
        Err(CellularError::Timeout)
    );

    assert_eq!(rig.channel.count(&Command::Abort), 1);
    assert_eq!(
        rig.channel.commands(),
        vec![
            Command::SelectOperator(OperatorSelection::ExtendedSearch),
            Command::Abort
        ]
    );
    assert_eq!(rig.clock.delays(), vec![Duration::from_millis(1_000)]);
}

#[test]
fn test_scan_reports_first_cell_and_aborts() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel
        .reply(Expect::CellFound, Ok(Response::Cell { mcc: 234 }))
        .reply(Expect::Aborted, Ok(Response::Aborted));

    let cell = modem.scan(Duration::from_secs(30)).unwrap();

    assert_eq!(cell, CellInfo { mcc: 234 });
    assert_eq!(rig.channel.count(&Command::Abort), 1);
    assert_eq!(rig.channel.flushes(), 2);
    assert_eq!(
        rig.clock.delays(),
        vec![Duration::from_millis(1_000), Duration::from_millis(50)]
    );
}

#[test]
fn test_scan_abort_not_acknowledged() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel
        .reply(Expect::CellFound, Ok(Response::Cell { mcc: 310 }));

    assert_eq!(
        modem.scan(Duration::from_secs(30)),
        Err(CellularError::Timeout)
    );
    assert_eq!(rig.channel.count(&Command::Abort), 1);
}

#[test]
fn test_scan_module_error_does_not_abort() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel.reply(Expect::CellFound, Err(AtError::Error));

    assert!(matches!(
        modem.scan(Duration::from_secs(30)),
        Err(CellularError::UnexpectedResponse(_))
    ));
    assert_eq!(rig.channel.count(&Command::Abort), 0);
}

#[test]
fn test_attach_and_detach() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel.reply_ok().reply_ok();

    modem.attach(NETWORK_TIMEOUT).unwrap();
    modem.detach(NETWORK_TIMEOUT).unwrap();

    assert_eq!(
        rig.channel.commands(),
        vec![
            Command::SelectOperator(OperatorSelection::Automatic),
            Command::SelectOperator(OperatorSelection::Deregister),
        ]
    );
}

#[test]
fn test_attach_timeout() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();

    assert!(matches!(
        modem.attach(NETWORK_TIMEOUT),
        Err(CellularError::Timeout)
    ));
    assert!(rig.clock.now() >= NETWORK_TIMEOUT);
}

// ============================================================================
// Packet Data
// ============================================================================

#[test]
fn test_activate_packet_context_without_credentials() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel.reply_ok();
    let attachment = modem.attach(NETWORK_TIMEOUT).unwrap();
    rig.channel.clear_history();

    rig.channel.reply_ok().reply_ok();
    modem
        .activate_packet_context(&attachment, &Apn::new("internet"), NETWORK_TIMEOUT)
        .unwrap();

    assert_eq!(
        rig.channel.commands(),
        vec![
            Command::SetApn {
                apn: "internet".to_string()
            },
            Command::ActivatePacketData,
        ]
    );
}

#[test]
fn test_activate_packet_context_with_credentials() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel.reply_ok();
    let attachment = modem.attach(NETWORK_TIMEOUT).unwrap();
    rig.channel.clear_history();

    for _ in 0..4 {
        rig.channel.reply_ok();
    }
    let apn = Apn::with_credentials("m2m.example", "device", "secret");
    modem
        .activate_packet_context(&attachment, &apn, NETWORK_TIMEOUT)
        .unwrap();

    assert_eq!(
        rig.channel.commands(),
        vec![
            Command::SetApn {
                apn: "m2m.example".to_string()
            },
            Command::SetPacketUsername {
                username: "device".to_string()
            },
            Command::SetPacketPassword {
                password: "secret".to_string()
            },
            Command::ActivatePacketData,
        ]
    );
}

#[test]
fn test_activate_packet_context_stops_at_failed_step() {
    let rig = Rig::new();
    let mut modem = rig.ready_modem();
    rig.channel.reply_ok();
    let attachment = modem.attach(NETWORK_TIMEOUT).unwrap();
    rig.channel.clear_history();

    rig.channel.reply(Expect::Ok, Err(AtError::Error));
    let apn = Apn::with_credentials("m2m.example", "device", "secret");

    assert!(matches!(
        modem.activate_packet_context(&attachment, &apn, NETWORK_TIMEOUT),
        Err(CellularError::UnexpectedResponse(_))
    ));
    assert_eq!(rig.channel.commands().len(), 1);
}
