//! UDP delivery of feed events to one subscriber.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{debug, error};
use stock_common::message::StockErrorPayload;
use stock_common::net::MAX_DATAGRAM;
use stock_common::{FeedError, FeedMessage, Quote, Result, Symbol};

use crate::registry::FeedEvent;

/// Encode `message` into datagrams no larger than [`MAX_DATAGRAM`].
///
/// A `priceUpdate` that does not fit is split into several smaller batches,
/// order preserved. Any other oversized message is an error.
pub fn encode_datagrams(message: FeedMessage) -> Result<Vec<Vec<u8>>> {
    let bytes = message.to_json_bytes()?;
    if bytes.len() <= MAX_DATAGRAM {
        return Ok(vec![bytes]);
    }
    match message {
        FeedMessage::PriceUpdate(mut quotes) if quotes.len() > 1 => {
            let tail = quotes.split_off(quotes.len() / 2);
            let mut datagrams = encode_datagrams(FeedMessage::PriceUpdate(quotes))?;
            datagrams.extend(encode_datagrams(FeedMessage::PriceUpdate(tail))?);
            Ok(datagrams)
        }
        _ => Err(FeedError::Format(format!(
            "message of {} bytes does not fit in a datagram",
            bytes.len()
        ))),
    }
}

/// Send one message to `target`, split over several datagrams if needed.
pub fn send_message(socket: &UdpSocket, target: SocketAddr, message: FeedMessage) -> Result<()> {
    for datagram in encode_datagrams(message)? {
        socket.send_to(&datagram, target)?;
    }
    Ok(())
}

/// Reply to a `REQUEST` with the quote, or with a `stockError` when unknown.
pub fn send_request_reply(
    socket: &UdpSocket,
    target: SocketAddr,
    symbol: &Symbol,
    lookup: Result<Quote>,
) -> Result<()> {
    let message = match lookup {
        Ok(quote) => FeedMessage::StockData(quote),
        Err(e) => FeedMessage::StockError(StockErrorPayload {
            symbol: symbol.clone(),
            message: e.to_string(),
        }),
    };
    send_message(socket, target, message)
}

/// Stream task for a single subscriber.
///
/// Forwards every event from `events` to `target` until the registry drops the
/// subscriber, a `Shutdown` arrives, or a send fails.
pub fn handle_client_stream(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    events: Receiver<FeedEvent>,
) -> Result<()> {
    for event in events.iter() {
        let message = match event {
            FeedEvent::Batch(quotes) => FeedMessage::PriceUpdate(quotes),
            FeedEvent::Single(quote) => FeedMessage::StockUpdated(quote),
            FeedEvent::Shutdown => break,
        };
        if let Err(e) = send_message(&socket, target, message) {
            error!("Failed to send update to {}: {}", target, e);
            return Err(e);
        }
    }
    debug!("Stream to {} finished", target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;
    use std::time::Duration;

    fn quote(symbol: &str) -> Quote {
        Quote::new(Symbol::parse(symbol).unwrap(), 101.0, 100.0)
            .unwrap()
            .with_name("A company name long enough to make the batch heavy")
    }

    fn bound() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        socket
    }

    fn receive(socket: &UdpSocket) -> FeedMessage {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let size = socket.recv(&mut buf).unwrap();
        FeedMessage::from_json_slice(&buf[..size]).unwrap()
    }

    #[test]
    fn small_batch_is_one_datagram() {
        let datagrams = encode_datagrams(FeedMessage::PriceUpdate(vec![quote("AAPL")])).unwrap();
        assert_eq!(datagrams.len(), 1);
    }

    #[test]
    fn oversized_batch_is_split_in_order() {
        let quotes: Vec<Quote> = (0..1000).map(|i| quote(&format!("S{}", i))).collect();
        let datagrams = encode_datagrams(FeedMessage::PriceUpdate(quotes.clone())).unwrap();
        assert!(datagrams.len() > 1);

        let mut rebuilt = Vec::new();
        for datagram in &datagrams {
            assert!(datagram.len() <= MAX_DATAGRAM);
            match FeedMessage::from_json_slice(datagram).unwrap() {
                FeedMessage::PriceUpdate(part) => rebuilt.extend(part),
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert_eq!(rebuilt, quotes);
    }

    #[test]
    fn stream_forwards_events_until_shutdown() {
        let client = bound();
        let target = client.local_addr().unwrap();
        let server = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let (tx, rx) = unbounded();

        let worker = thread::spawn(move || handle_client_stream(server, target, rx));
        tx.send(FeedEvent::Batch(vec![quote("AAPL")])).unwrap();
        tx.send(FeedEvent::Single(quote("MSFT"))).unwrap();
        tx.send(FeedEvent::Shutdown).unwrap();

        assert!(matches!(receive(&client), FeedMessage::PriceUpdate(q) if q.len() == 1));
        assert!(matches!(receive(&client), FeedMessage::StockUpdated(q) if q.symbol.as_str() == "MSFT"));
        assert!(worker.join().unwrap().is_ok());
    }

    #[test]
    fn request_reply_for_unknown_symbol_is_an_error_event() {
        let client = bound();
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let symbol = Symbol::parse("ZZZZ").unwrap();

        send_request_reply(
            &server,
            client.local_addr().unwrap(),
            &symbol,
            Err(FeedError::SymbolNotFound("ZZZZ".to_string())),
        )
        .unwrap();
        match receive(&client) {
            FeedMessage::StockError(payload) => {
                assert_eq!(payload.symbol, symbol);
                assert!(payload.message.contains("ZZZZ"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
