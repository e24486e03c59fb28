use crate::{Error, Result};

use futures::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_serde::formats::*;
use tokio_serde::Framed;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Reads `I` frames, bincode over length-delimited TCP.
pub type Reader<I> = Framed<FramedRead<OwnedReadHalf, LengthDelimitedCodec>, I, (), Bincode<I, ()>>;

/// Writes `O` frames, bincode over length-delimited TCP.
pub type Writer<O> = Framed<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>, (), O, Bincode<(), O>>;

pub struct Receiver<I> {
    reader: Reader<I>,
}

impl<I> Receiver<I>
where
    I: for<'de> Deserialize<'de> + Unpin,
{
    pub async fn recv(&mut self) -> Result<Option<I>> {
        Ok(self.reader.try_next().await?)
    }
}

pub struct Sender<O> {
    writer: Writer<O>,
}

impl<O> Sender<O>
where
    O: Serialize + Unpin,
{
    pub async fn send(&mut self, item: O) -> Result<()> {
        Ok(self.writer.send(item).await?)
    }
}

/// Splits a TCP stream into an owned sender of `O` and receiver of `I`, so that
/// both halves may be moved into separate tasks.
pub fn split<I, O>(socket: TcpStream) -> (Sender<O>, Receiver<I>) {
    let (reader, writer) = socket.into_split();

    let reader = FramedRead::new(reader, LengthDelimitedCodec::new());
    let reader = Framed::new(reader, Bincode::default());

    let writer = FramedWrite::new(writer, LengthDelimitedCodec::new());
    let writer = Framed::new(writer, Bincode::default());

    (Sender { writer }, Receiver { reader })
}

pub async fn connect<I, O>(address: &SocketAddr) -> Result<(Sender<O>, Receiver<I>)> {
    let socket = TcpStream::connect(address).await.map_err(Error::IO)?;
    Ok(split(socket))
}

pub async fn accept<I, O>(listener: &TcpListener) -> Result<(Sender<O>, Receiver<I>, SocketAddr)> {
    let (socket, address) = listener.accept().await.map_err(Error::IO)?;
    let (sender, receiver) = split(socket);
    Ok((sender, receiver, address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    pub struct Request(String);
    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    pub struct Response(String);

    #[actix_rt::test]
    async fn asymmetric_send_recv() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle_1 = tokio::spawn(async move {
            let (mut sender, mut receiver, _) =
                accept::<Response, Request>(&listener).await.expect("failed to accept connection");

            sender.send(Request(String::from("123"))).await.unwrap();
            let msg = receiver.recv().await.unwrap();
            assert_eq!(msg, Some(Response(String::from("321"))));
        });

        let handle_2 = tokio::spawn(async move {
            let (mut sender, mut receiver) =
                connect::<Request, Response>(&address).await.expect("failed to connect");

            let msg = receiver.recv().await.unwrap();
            assert_eq!(msg, Some(Request(String::from("123"))));
            sender.send(Response(String::from("321"))).await.unwrap();
        });

        handle_2.await.unwrap();
        handle_1.await.unwrap();
    }

    #[actix_rt::test]
    async fn recv_returns_none_on_hangup() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (_sender, mut receiver, _) = accept::<Request, Response>(&listener).await.unwrap();
            receiver.recv().await.unwrap()
        });

        let (sender, receiver) = connect::<Response, Request>(&address).await.unwrap();
        drop(sender);
        drop(receiver);

        assert_eq!(handle.await.unwrap(), None);
    }
}
