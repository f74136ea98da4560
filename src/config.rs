//! Configuração do harvest carregada a partir de `harvest.toml`.
//!
//! A struct [`HarvestConfig`] contém as contas, o relatório pedido e a
//! política de polling. Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `META_ACCESS_TOKEN` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::HarvestError;
use crate::graph::GraphClient;
use crate::policy::PollPolicy;
use crate::report::ReportRequest;
use crate::state_machine::AccountMap;

/// Caminho padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_PATH: &str = "harvest.toml";

/// Configuração de nível superior carregada de `harvest.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Token de acesso da Graph API.
    #[serde(default)]
    pub access_token: String,

    /// Versão da Graph API usada nas URLs.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// URL base da Graph API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Arquivo de saída do relatório consolidado.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Nome do cliente → ID da conta de anúncios (ex.: `act_123`).
    #[serde(default)]
    pub accounts: AccountMap,

    /// Campos e parâmetros pedidos a todas as contas.
    #[serde(default)]
    pub report: ReportRequest,

    /// Intervalo entre rodadas e limites do polling.
    #[serde(default)]
    pub polling: PollPolicy,
}

// Valor padrão para a versão da API: "v19.0".
fn default_api_version() -> String {
    "v19.0".to_string()
}

// Valor padrão para a URL base.
fn default_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

// Valor padrão para o arquivo de saída.
fn default_output() -> PathBuf {
    PathBuf::from("consolidated_report.csv")
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_version: default_api_version(),
            base_url: default_base_url(),
            output: default_output(),
            accounts: AccountMap::new(),
            report: ReportRequest::default(),
            polling: PollPolicy::default(),
        }
    }
}

impl HarvestConfig {
    /// Carrega a configuração de `path`. Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self, HarvestError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<HarvestConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para o token.
        if let Ok(token) = std::env::var("META_ACCESS_TOKEN")
            && !token.is_empty()
        {
            config.access_token = token;
        }

        Ok(config)
    }

    /// Valida que há o mínimo para rodar uma extração.
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.accounts.is_empty() {
            return Err(HarvestError::NoAccounts);
        }
        if self.access_token.is_empty() {
            return Err(HarvestError::MissingToken);
        }
        if self.report.fields.is_empty() {
            return Err(HarvestError::Config("report.fields must not be empty".into()));
        }
        if let Some((name, _)) = self
            .accounts
            .iter()
            .find(|(_, account_ref)| account_ref.trim().is_empty())
        {
            return Err(HarvestError::Config(format!(
                "account '{name}' has an empty account id"
            )));
        }
        if !self.polling.jitter.is_finite() {
            return Err(HarvestError::Config(format!(
                "polling.jitter must be a finite number, got {}",
                self.polling.jitter
            )));
        }
        Ok(())
    }

    /// Cria a sessão da Graph API a partir desta configuração.
    pub fn session(&self) -> Result<GraphClient, HarvestError> {
        let client = GraphClient::with_base_url(
            self.access_token.clone(),
            self.base_url.clone(),
            self.api_version.clone(),
        )?;
        Ok(client.with_page_limit(self.report.params.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Backoff;
    use crate::report::DateRange;

    #[test]
    fn default_config_values() {
        let config = HarvestConfig::default();
        assert_eq!(config.api_version, "v19.0");
        assert_eq!(config.output, PathBuf::from("consolidated_report.csv"));
        assert!(config.accounts.is_empty());
        assert!(config.access_token.is_empty());
        assert_eq!(config.report.params.limit, 2000);
        assert_eq!(config.polling.base_delay_ms, 5000);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            access_token = "EAAB-test"
            output = "out.csv"

            [accounts]
            ClientA = "act_1"
            ClientB = "act_2"

            [report]
            fields = ["campaign_name", "spend"]
            level = "campaign"
            date_range = { since = "2024-03-01", until = "2024-03-31" }

            [polling]
            backoff = "fixed"
            max_rounds = 12
        "#;
        let config: HarvestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.access_token, "EAAB-test");
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts["ClientB"], "act_2");
        assert_eq!(config.report.fields, vec!["campaign_name", "spend"]);
        assert_eq!(config.report.params.level, "campaign");
        assert!(matches!(
            config.report.params.date_range,
            DateRange::Window { .. }
        ));
        assert_eq!(config.polling.backoff, Backoff::Fixed);
        assert_eq!(config.polling.max_rounds, Some(12));
        assert_eq!(config.api_version, "v19.0");
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarvestConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert!(config.accounts.is_empty());
        assert_eq!(config.polling.timeout_secs, Some(1800));
    }

    #[test]
    fn env_token_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.toml");
        std::fs::write(&path, "access_token = \"from-file\"\n").unwrap();

        // SAFETY: nenhum outro teste lê ou escreve META_ACCESS_TOKEN.
        unsafe { std::env::set_var("META_ACCESS_TOKEN", "from-env") };
        let config = HarvestConfig::load_from(&path).unwrap();
        unsafe { std::env::remove_var("META_ACCESS_TOKEN") };

        assert_eq!(config.access_token, "from-env");
    }

    #[test]
    fn validate_requires_accounts_and_token() {
        let mut config = HarvestConfig::default();
        assert!(matches!(config.validate(), Err(HarvestError::NoAccounts)));

        config.accounts.insert("ClientA".into(), "act_1".into());
        assert!(matches!(config.validate(), Err(HarvestError::MissingToken)));

        config.access_token = "tok".into();
        assert!(config.validate().is_ok());

        config.accounts.insert("ClientB".into(), " ".into());
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn validate_rejects_non_finite_jitter() {
        let mut config: HarvestConfig = toml::from_str(
            r#"
            access_token = "tok"

            [accounts]
            ClientA = "act_1"

            [polling]
            jitter = nan
        "#,
        )
        .unwrap();
        assert!(config.polling.jitter.is_nan());
        match config.validate() {
            Err(HarvestError::Config(msg)) => assert!(msg.contains("jitter")),
            other => panic!("expected config error, got {other:?}"),
        }

        config.polling.jitter = f64::INFINITY;
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));

        config.polling.jitter = 0.25;
        assert!(config.validate().is_ok());
    }
}
