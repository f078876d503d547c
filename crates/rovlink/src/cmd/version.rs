use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("rovlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: rovlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("ROVLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: session={}, device={}, async={}, cli=true",
        cfg!(feature = "session"),
        cfg!(feature = "device"),
        cfg!(feature = "async")
    );
    println!("default_baud: {}", rovlink_transport::DEFAULT_BAUD);
    println!(
        "max_frame_len: {}",
        rovlink_frame::DEFAULT_MAX_FRAME_LEN
    );

    Ok(SUCCESS)
}
