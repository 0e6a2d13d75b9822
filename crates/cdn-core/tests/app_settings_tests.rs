use std::io::Write;
use std::time::Duration;

use cdn_core::{AppSettings, MalformedCertificatePolicy, SettingsError, SmtpTlsMode};

#[test]
fn test_empty_document_uses_defaults() {
    let settings = AppSettings::from_yaml_str("").unwrap();

    assert_eq!(settings.acme_renewal.window_days(), 30);
    assert_eq!(
        settings.acme_renewal.per_certificate_timeout(),
        Duration::from_secs(20 * 60)
    );
    assert_eq!(
        settings.acme_renewal.malformed_certificate_policy,
        MalformedCertificatePolicy::AbortBatch
    );
    assert!(!settings.lets_encrypt.convert_self_signed);
    assert!(settings.acme_accounts.is_empty());
    assert!(settings.summary_destination().is_none());
}

#[test]
fn test_zero_window_means_thirty_days() {
    let settings = AppSettings::from_yaml_str(
        r#"
acme_renewal:
  renew_days_before_expiration: 0
"#,
    )
    .unwrap();
    assert_eq!(settings.acme_renewal.window_days(), 30);

    let settings = AppSettings::from_yaml_str(
        r#"
acme_renewal:
  renew_days_before_expiration: 14
"#,
    )
    .unwrap();
    assert_eq!(settings.acme_renewal.window_days(), 14);
}

#[test]
fn test_zero_timeout_means_twenty_minutes() {
    let settings = AppSettings::from_yaml_str(
        r#"
acme_renewal:
  per_certificate_timeout_secs: 0
"#,
    )
    .unwrap();
    assert_eq!(
        settings.acme_renewal.per_certificate_timeout(),
        Duration::from_secs(20 * 60)
    );

    let settings = AppSettings::from_yaml_str(
        r#"
acme_renewal:
  per_certificate_timeout_secs: 90
"#,
    )
    .unwrap();
    assert_eq!(
        settings.acme_renewal.per_certificate_timeout(),
        Duration::from_secs(90)
    );
}

#[test]
fn test_full_document() {
    let settings = AppSettings::from_yaml_str(
        r#"
acme_renewal:
  renew_days_before_expiration: 21
  summary_email: ops@cdn.example
  per_certificate_timeout_secs: 60
  malformed_certificate_policy: isolate
lets_encrypt:
  email: certs@cdn.example
  environment: staging
  convert_self_signed: true
acme_accounts:
  - acme_provider: sectigo-acme
    user_email: certs@cdn.example
    acme_url: https://acme.sectigo.example/directory
    kid: kid-123
    hmac_encoded: c2VjcmV0
smtp:
  enabled: true
  host: smtp.cdn.example
  port: 465
  from_address: to@cdn.example
  tls_mode: tls
"#,
    )
    .unwrap();

    assert_eq!(settings.acme_renewal.window_days(), 21);
    assert_eq!(
        settings.acme_renewal.malformed_certificate_policy,
        MalformedCertificatePolicy::Isolate
    );
    assert!(settings.lets_encrypt.convert_self_signed);
    assert_eq!(
        settings.lets_encrypt.directory(),
        "https://acme-staging-v02.api.letsencrypt.org/directory"
    );
    assert_eq!(settings.smtp.tls_mode, SmtpTlsMode::Tls);
    assert_eq!(settings.summary_destination(), Some("ops@cdn.example"));

    let account = settings.acme_account("sectigo-acme").unwrap();
    assert_eq!(account.kid.as_deref(), Some("kid-123"));
    assert!(settings.acme_account("unknown-acme").is_none());
}

#[test]
fn test_summary_requires_smtp_enabled() {
    let settings = AppSettings::from_yaml_str(
        r#"
acme_renewal:
  summary_email: ops@cdn.example
smtp:
  enabled: false
"#,
    )
    .unwrap();
    assert!(settings.summary_destination().is_none());
}

#[test]
fn test_directory_override() {
    let settings = AppSettings::from_yaml_str(
        r#"
lets_encrypt:
  directory_url: https://localhost:14000/dir
"#,
    )
    .unwrap();
    assert_eq!(settings.lets_encrypt.directory(), "https://localhost:14000/dir");
}

#[test]
fn test_half_configured_external_account_binding_is_rejected() {
    let result = AppSettings::from_yaml_str(
        r#"
acme_accounts:
  - acme_provider: zerossl
    user_email: certs@cdn.example
    acme_url: https://acme.zerossl.example/directory
    kid: only-kid
"#,
    );
    assert!(matches!(result, Err(SettingsError::Invalid(_))));
}

#[test]
fn test_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "lets_encrypt:\n  environment: staging").unwrap();

    let settings = AppSettings::from_yaml_file(file.path()).unwrap();
    assert_eq!(settings.lets_encrypt.environment, "staging");

    let missing = AppSettings::from_yaml_file("/nonexistent/cdn-settings.yaml");
    assert!(matches!(missing, Err(SettingsError::Io(_))));
}
