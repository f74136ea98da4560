//! Interface de terminal do harvest — spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`HarvestProgress`] acompanha visualmente
//! as rodadas de polling e o desfecho de cada conta.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::ExtractionReport;
use crate::poller::PollEvent;
use crate::state_machine::JobState;

/// Tom da linha impressa quando um job termina.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Warning,
    Failure,
}

/// Texto e tom para o fim de um job.
///
/// `rows` só é `Some` quando o resultado foi baixado; um job `COMPLETED`
/// sem linhas contadas teve o download falho e é exibido como falha.
fn describe_finish(account: &str, state: JobState, rows: Option<usize>) -> (Tone, String) {
    match (state, rows) {
        (JobState::Completed, Some(0)) => (Tone::Warning, format!("{account}: completed without data")),
        (JobState::Completed, Some(rows)) => (Tone::Success, format!("{account}: {rows} row(s)")),
        (JobState::Completed, None) => (Tone::Failure, format!("{account}: result download failed")),
        (state, _) => (Tone::Failure, format!("{account}: {state}")),
    }
}

/// Indicador visual de progresso de uma extração no terminal.
///
/// Exibe um spinner animado enquanto há jobs ativos e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e aviso (amarelo).
pub struct HarvestProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para contas concluídas.
    green: Style,
    // Estilo vermelho para contas com falha.
    red: Style,
    // Estilo amarelo para avisos.
    yellow: Style,
}

impl HarvestProgress {
    /// Inicia o spinner com o número de contas e retorna a instância de progresso.
    pub fn start(accounts: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Submitting {accounts} report jobs..."));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza o spinner a partir de um evento do poller.
    pub fn observe(&self, event: &PollEvent<'_>) {
        match event {
            PollEvent::RoundStarted {
                round,
                active,
                delay,
            } => {
                self.pb.set_message(format!(
                    "Round {round}: {active} job(s) in progress (next check in {:.1}s)",
                    delay.as_secs_f64()
                ));
            }
            PollEvent::JobFinished {
                account,
                state,
                rows,
            } => {
                let (tone, text) = describe_finish(account, *state, *rows);
                let mark = match tone {
                    Tone::Success => self.green.apply_to("✓"),
                    Tone::Warning => self.yellow.apply_to("!"),
                    Tone::Failure => self.red.apply_to("✗"),
                };
                self.pb.println(format!("  {mark} {text}"));
            }
            PollEvent::PolicyExhausted { remaining } => {
                self.pb.println(format!(
                    "  {} Poll limit reached, {remaining} job(s) abandoned",
                    self.yellow.apply_to("⏱")
                ));
            }
        }
    }

    /// Finaliza o spinner e exibe o resumo da extração.
    pub fn complete(&self, report: &ExtractionReport) {
        self.pb.finish_and_clear();
        match report.outcome.dataset() {
            Some(ds) => println!(
                "  {} {} row(s) consolidated after {} round(s)",
                self.green.apply_to("✓"),
                ds.len(),
                report.rounds
            ),
            None => println!(
                "  {} No data extracted from any account",
                self.yellow.apply_to("!")
            ),
        }
        for failure in &report.failures {
            println!(
                "  {} {}: {}",
                self.red.apply_to("✗"),
                failure.account_name,
                failure.reason
            );
        }
    }

    /// Imprime os registros de auditoria formatados em JSON.
    pub fn print_audits(&self, report: &ExtractionReport) {
        println!();
        println!("{}", self.yellow.apply_to("─── Job Audit ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(&report.audits).unwrap_or_default()
        );
    }
}
