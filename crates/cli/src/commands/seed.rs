use crate::commands::{CommandContext, CommandError, CommandResult, ErrorClass};
use wayfarer_db::{migrations, seed_sample_data, SeedSummary};

pub fn run() -> CommandResult {
    match populate() {
        Ok(summary) => CommandResult::success("seed", describe(summary)),
        Err(error) => CommandResult::failure("seed", error.class, error.message),
    }
}

fn populate() -> Result<SeedSummary, CommandError> {
    let context = CommandContext::prepare()?;
    let pool = context.open_pool()?;

    let outcome = context.block_on(async {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandError::new(ErrorClass::Migration, error.to_string()))?;

        seed_sample_data(&pool)
            .await
            .map_err(|error| CommandError::new(ErrorClass::SeedExecution, error.to_string()))
    });

    context.block_on(pool.close());
    outcome
}

fn describe(summary: SeedSummary) -> String {
    let SeedSummary { agents, clients, quotes } = summary;

    if agents == 0 && clients == 0 && quotes == 0 {
        return "demo data already present; nothing inserted".to_string();
    }

    format!("seeded demo data: {agents} agent(s), {clients} client(s), {quotes} quote(s)")
}
