// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_velodyne::{
    Calibration, Error, FrameInfo, InterpreterConfig, LegacyInterpreter, PacketInterpreter,
    PacketSource, RawPacket,
    packet_source::{RecordSource, replay},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Catalog pass over the whole dump. The source is rewound afterwards.
async fn build_catalog(
    source: &mut RecordSource,
    interpreter: &mut LegacyInterpreter,
) -> Result<Vec<FrameInfo>, Error> {
    let mut catalog = Vec::new();
    let mut buf = vec![0u8; 2048];

    while source.has_more() {
        let meta = source.recv(&mut buf).await?;
        let packet = RawPacket {
            data: &buf[..meta.len],
            file_position: meta.file_position,
            network_time: meta.network_time,
        };
        if let Some(entry) = interpreter.preprocess_packet(&packet) {
            catalog.push(entry);
        }
    }

    source.seek(0);
    debug!("catalog holds {} frames", catalog.len());
    Ok(catalog)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.rust_log.into())
                .from_env_lossy(),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => InterpreterConfig::from_file(path)?,
        None => InterpreterConfig::default(),
    };
    if let Some(time_adjust) = args.time_adjust {
        config.time_adjust = time_adjust;
    }
    debug!("{:?}", config);

    let mut interpreter = match args.sensor {
        Some(model) => {
            LegacyInterpreter::with_calibration(config, Calibration::factory_default(model))?
        }
        None => LegacyInterpreter::new(config)?,
    };

    let mut source = RecordSource::open(&args.input).await?;
    info!(
        "replaying {} records from {}",
        source.len(),
        args.input.display()
    );

    if args.catalog || args.start_frame.is_some() {
        let catalog = build_catalog(&mut source, &mut interpreter).await?;
        if args.catalog {
            println!("{}", serde_json::to_string_pretty(&catalog)?);
            return Ok(());
        }

        let start = args.start_frame.unwrap_or_default();
        let entry = catalog.get(start).ok_or_else(|| {
            Error::Config(format!(
                "start frame {} beyond the {} catalogued frames",
                start,
                catalog.len()
            ))
        })?;
        source.seek(entry.file_position.unwrap_or_default());
        interpreter.resume_from(entry);
    }

    let stats = replay(&mut source, &mut interpreter, |frame| {
        info!(
            "frame {}: {} points, {} firings skipped, {} rollovers, {:.1} rpm",
            frame.frame_id(),
            frame.len(),
            frame.firing_to_skip(),
            frame.rolling_count(),
            frame.rpm()
        );
    })
    .await?;

    info!(
        "{} packets ({} rejected), {} frames, {} warnings",
        stats.packets,
        stats.rejected,
        stats.frames,
        stats.warnings.len()
    );
    info!("{}", interpreter.sensor_information());

    Ok(())
}
