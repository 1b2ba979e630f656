use std::sync::Arc;

use canmux_dispatch::{DispatchError, Dispatcher};
use canmux_frame::{CanFrame, Filter, EXTENDED_ID_MAX, STANDARD_ID_MAX};
use canmux_transport::ReplayTransport;
use tracing::{debug, info};

use crate::cmd::ReplayArgs;
use crate::exit::{dispatch_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let transport = ReplayTransport::open(&args.capture)
        .map_err(|err| transport_error(&format!("failed opening {}", args.capture.display()), err))?;
    let dispatcher = Dispatcher::new(Arc::new(transport));
    let handle = dispatcher
        .register_client(replay_filter(&args), args.queue_size)
        .map_err(|err| dispatch_error("client registration failed", err))?;

    let limit = args.count.unwrap_or(usize::MAX);
    let mut frames: Vec<CanFrame> = Vec::new();
    let mut read = 0usize;

    while frames.len() < limit {
        match dispatcher.read_one_no_handle() {
            Ok(_) => read += 1,
            Err(DispatchError::NoNewMessage) => break,
            Err(err) => return Err(dispatch_error("replay failed", err)),
        }
        while frames.len() < limit {
            match dispatcher.read_from_queue(handle) {
                Ok(frame) => frames.push(frame),
                Err(DispatchError::WouldBlock) => break,
                Err(err) => return Err(dispatch_error("queue read failed", err)),
            }
        }
    }

    debug!(read, matched = frames.len(), "replay finished");
    print_frames(&frames, format);
    info!(
        capture = %args.capture.display(),
        read,
        matched = frames.len(),
        "replayed capture"
    );
    Ok(SUCCESS)
}

fn replay_filter(args: &ReplayArgs) -> Option<Filter> {
    let id = args.id?;
    let full_mask = if args.extended {
        EXTENDED_ID_MAX
    } else {
        STANDARD_ID_MAX
    };
    let mask = args.mask.unwrap_or(full_mask);
    Some(Filter {
        extended_must_match: true,
        extended_value: args.extended,
        ..Filter::id_mask(id, mask)
    })
}
