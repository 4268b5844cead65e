//! Secrets for site-to-site VPNs and BGP sessions
//!
//! Kept in their own YAML file, keyed by VPN name (or BGP neighbor address).

use naas_core::ValidationError;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretsDocument {
    #[serde(alias = "vault_site_to_site_vpn_keys", alias = "presharedKeys")]
    pub preshared_keys: BTreeMap<String, String>,
    #[serde(alias = "vault_bgp_md5_passwords", alias = "bgpMd5Passwords")]
    pub bgp_md5_passwords: BTreeMap<String, String>,
}

impl std::fmt::Debug for SecretsDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsDocument")
            .field("preshared_keys", &self.preshared_keys.keys().collect::<Vec<_>>())
            .field(
                "bgp_md5_passwords",
                &self.bgp_md5_passwords.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SecretsDocument {
    pub fn preshared_key(&self, vpn: &str) -> Result<&str, ValidationError> {
        self.preshared_keys
            .get(vpn)
            .map(String::as_str)
            .ok_or_else(|| ValidationError::MissingSecret {
                kind: "preshared key".to_string(),
                name: vpn.to_string(),
            })
    }

    pub fn md5_password(&self, key: &str) -> Option<&str> {
        self.bgp_md5_passwords.get(key).map(String::as_str)
    }
}
