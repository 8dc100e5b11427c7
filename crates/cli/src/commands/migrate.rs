use crate::commands::{CommandContext, CommandError, CommandResult, ErrorClass};
use wayfarer_db::migrations;

pub fn run() -> CommandResult {
    match apply() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(error) => CommandResult::failure("migrate", error.class, error.message),
    }
}

fn apply() -> Result<(), CommandError> {
    let context = CommandContext::prepare()?;
    let pool = context.open_pool()?;

    let outcome = context.block_on(async {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandError::new(ErrorClass::Migration, error.to_string()))
    });

    context.block_on(pool.close());
    outcome
}
