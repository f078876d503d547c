use std::fs;
use std::io::{Cursor, Read};

use rovlink_frame::FrameReader;
use rovlink_records::{RawRecord, Record, RecordConfig, RecordError, RecordRegistry};
use tracing::{info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Debug, Default, PartialEq, Eq)]
struct DecodeTally {
    records: u64,
    rejected: u64,
    unparsable: u64,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = match &args.file {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            buf
        }
    };

    let registry = RecordRegistry::standard(RecordConfig {
        servo_count: args.servo_count,
    });
    let (tally, log_lines) = decode(&bytes, &registry, |sequence, record| {
        print_record(sequence, None, record, format)
    })?;

    info!(
        records = tally.records,
        rejected = tally.rejected,
        unparsable = tally.unparsable,
        log_lines,
        "decode finished"
    );
    if tally.rejected + tally.unparsable > 0 {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

/// Decode every frame in `bytes`, handing each record to `emit`.
///
/// Frames with an unregistered category come out as raw records.
fn decode<F>(
    bytes: &[u8],
    registry: &RecordRegistry,
    mut emit: F,
) -> CliResult<(DecodeTally, u64)>
where
    F: FnMut(u32, &Record),
{
    let mut reader = FrameReader::new(Cursor::new(bytes));
    let mut tally = DecodeTally::default();

    loop {
        let frame = match reader.poll_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) if err.is_recoverable() => {
                tally.rejected += 1;
                warn!(error = %err, "frame rejected");
                continue;
            }
            Err(err) => return Err(frame_error("decode failed", err)),
        };

        let record = match registry.parse(&frame) {
            Ok(record) => record,
            Err(RecordError::UnknownCategory(_)) => Record::Raw(RawRecord::from_frame(&frame)),
            Err(err) => {
                tally.unparsable += 1;
                warn!(error = %err, sequence = frame.sequence, "frame not parsable");
                continue;
            }
        };
        tally.records += 1;
        emit(frame.sequence, &record);
    }

    Ok((tally, reader.log_lines()))
}
