use std::process::ExitCode;

fn main() -> ExitCode {
    let env = env_logger::Env::default()
        .filter_or("SIPREG_LOG_LEVEL", "info")
        .write_style_or("SIPREG_LOG_STYLE", "auto");

    env_logger::init_from_env(env);

    match sip_register::run() {
        Ok(registered) => {
            log::info!(
                "registration succeeded{}",
                if registered.authenticated {
                    ""
                } else {
                    " (no authentication required)"
                }
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("registration failed: {err}");
            ExitCode::FAILURE
        }
    }
}
