use crate::domain::agent::AgentRecord;
use crate::error::Result;
use std::io::Write;

/// Writes the final reputation table as CSV, highest score first (ties broken
/// by agent id so the output is deterministic).
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_agents(&mut self, mut agents: Vec<AgentRecord>) -> Result<()> {
        agents.sort_by(|a, b| {
            b.global_reputation
                .partial_cmp(&a.global_reputation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        self.writer.write_record([
            "agent_id",
            "global_reputation",
            "total_transactions",
            "last_updated",
        ])?;
        for agent in agents {
            self.writer.write_record([
                agent.id.as_str(),
                &format!("{:.2}", agent.global_reputation),
                &agent.total_transactions.to_string(),
                &agent.last_updated.to_rfc3339(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
