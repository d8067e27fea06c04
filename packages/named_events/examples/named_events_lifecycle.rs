//! Example walking a connection through its lifecycle.
//!
//! Handlers are bound once on the producer and run for every connection it creates.
//! Raise the max level below to `TRACE` to also see handlers being bound.

use std::io;

use futures::executor::block_on;
use named_events::Error;
use named_events::protocol::{
    CONNECTION_LOST, CONNECTION_MADE, DATA_PROCESSED, PRE_REQUEST, Producer, ProtocolHandler,
};

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Connection Lifecycle Example ===");

    let producer = Producer::new("example");
    let events = producer.events();

    events
        .event(CONNECTION_MADE)?
        .bind(ProtocolHandler::new(|session, _| {
            println!("{session}: connected");
            Ok(())
        }))?;

    events
        .event(PRE_REQUEST)?
        .bind(ProtocolHandler::new(|session, _| {
            // Only every other session gets served.
            if session.get() % 2 == 0 {
                println!("{session}: rejecting request");
                return Err(Error::Abort);
            }

            println!("{session}: starting request");
            Ok(())
        }))?;

    events
        .event(DATA_PROCESSED)?
        .bind(ProtocolHandler::new(|session, fire| {
            if let Some(data) = fire.data() {
                println!("{session}: received {}", String::from_utf8_lossy(data));
            }
            Ok(())
        }))?;

    events
        .event(CONNECTION_LOST)?
        .bind(ProtocolHandler::new(|session, fire| {
            match fire.error() {
                Some(error) => println!("{session}: lost ({error:?})"),
                None => println!("{session}: closed"),
            }
            Ok(())
        }))?;

    println!("\n1. Graceful close:");
    let first = producer.create_connection()?;
    first.connection_made()?;
    first.data_received(b"hello")?;
    if let Some(closed) = first.close()? {
        let outcome = block_on(closed);
        println!("close completed: {outcome:?}");
    }

    println!("\n2. Aborted request and reset connection:");
    let second = producer.create_connection()?;
    second.connection_made()?;
    second.data_received(b"ignored")?;
    second.connection_lost(Some(io::ErrorKind::ConnectionReset))?;

    println!(
        "\nProducer '{}' served {} sessions and {} requests.",
        producer.name(),
        producer.sessions(),
        producer.requests_processed()
    );

    Ok(())
}
