mod argutil;
mod coding;
mod config;
mod logging;
mod message;

fn main() -> anyhow::Result<()> {
    let command = crate::argutil::build_commands();
    let arg_matches = command.get_matches();

    crate::logging::set_up_logging(&arg_matches)?;

    let result = match arg_matches.subcommand() {
        Some(("headers", sub_matches)) => crate::message::run_headers(sub_matches),
        Some(("decode", sub_matches)) => crate::message::run_decode(sub_matches),
        Some(("coding", sub_matches)) => crate::coding::run(sub_matches),
        _ => unreachable!(),
    };

    match result {
        Ok(_) => {
            tracing::info!("program exit ok");
            Ok(())
        }
        Err(error) => {
            tracing::error!(%error, "program exit error");
            Err(error)
        }
    }
}
