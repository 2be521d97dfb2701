use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("compost {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: compost");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("COMPOST_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("transports: tcp, {}spawn", if cfg!(unix) { "unix, " } else { "" });
    println!(
        "reserved_rpc_ids: error={:#05x}, unsupported={:#05x}",
        compost_frame::ERROR_RESPONSE,
        compost_frame::UNSUPPORTED_RESPONSE
    );
    println!("features: cli=true");

    Ok(SUCCESS)
}
