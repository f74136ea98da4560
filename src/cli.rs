//! Interface de linha de comando do harvest baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (extract, accounts, fields)
//! e flags globais (--config, --max-rounds, --timeout-secs, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::export::OutputFormat;

/// insights-harvest — extração assíncrona de insights de várias contas de anúncios.
#[derive(Debug, Parser)]
#[command(name = "insights-harvest", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Número máximo de rodadas de polling.
    #[arg(long, global = true)]
    pub max_rounds: Option<u32>,

    /// Tempo máximo de polling em segundos.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extrai, consolida e salva os insights de todas as contas configuradas.
    Extract {
        /// Arquivo de saída (sobrescreve `output` do config).
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Formato de saída; por padrão deduzido da extensão do arquivo.
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Lista as contas configuradas.
    Accounts,

    /// Mostra os campos e parâmetros pedidos em cada job.
    Fields,
}
