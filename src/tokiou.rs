use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::batch::BatchRequest;
use crate::codec;
use crate::error::Result;
use crate::parser::{parse_batch_request_with, ParserConfig};
use crate::serializer::{to_string_with, SerializerConfig};

/// Reads a whole document from `reader` and parses it as a batchRequest.
pub async fn read_batch<R: AsyncRead + Unpin>(reader: &mut R, config: ParserConfig) -> Result<BatchRequest> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data).await?;
    let text = std::str::from_utf8(&data)?;
    parse_batch_request_with(text, config)
}

pub async fn write_batch<W: AsyncWrite + Unpin>(writer: &mut W, batch: &BatchRequest, config: &SerializerConfig) -> Result<()> {
    let xml = to_string_with(batch, config)?;
    writer.write_all(xml.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes every request of the batch as a BER LDAPMessage, in batch order.
/// Requests without a `requestID` are numbered by
/// [`BatchRequest::message_ids`], so no two PDUs share an id.
pub async fn submit_batch<W: AsyncWrite + Unpin>(writer: &mut W, batch: &BatchRequest) -> Result<usize> {
    for (message, id) in batch.requests.iter().zip(batch.message_ids()) {
        let pdu = codec::encode_message(message, id)?;
        tracing::debug!(request = message.params.tag(), len = pdu.len(), "submitting");
        writer.write_all(&pdu).await?;
    }
    writer.flush().await?;
    Ok(batch.requests.len())
}

#[cfg(test)]
const DEL_BATCH: &str = r#"<batchRequest xmlns="urn:oasis:names:tc:DSML:2:0:core">
  <delRequest dn="cn=a"/>
  <abandonRequest abandonID="5"/>
</batchRequest>"#;

#[tokio::test]
async fn read_batch_test() {
    let (head, tail) = DEL_BATCH.as_bytes().split_at(40);
    let mut reader = tokio_test::io::Builder::new()
        .read(head)
        .read(tail)
        .build();
    let batch = read_batch(&mut reader, ParserConfig::default()).await.unwrap();
    assert_eq!(batch.requests.len(), 2);
    assert_eq!(batch.requests[0].params.tag(), "delRequest");
}

#[tokio::test]
async fn read_batch_invalid_utf8_test() {
    let mut reader = tokio_test::io::Builder::new()
        .read(&[0x3c, 0xff, 0xfe])
        .build();
    let err = read_batch(&mut reader, ParserConfig::default()).await.unwrap_err();
    assert!(matches!(err, crate::error::DsmlError::Utf8(_)));
}

#[tokio::test]
async fn submit_batch_test() {
    let batch = crate::parser::parse_batch_request(DEL_BATCH).unwrap();
    let mut writer = tokio_test::io::Builder::new()
        .write(&hex::decode("30090201014a04636e3d61").unwrap())
        .write(&hex::decode("3006020102500105").unwrap())
        .build();
    assert_eq!(submit_batch(&mut writer, &batch).await.unwrap(), 2);
}

#[tokio::test]
async fn write_batch_test() {
    let batch = crate::parser::parse_batch_request(DEL_BATCH).unwrap();
    let config = SerializerConfig::compact();
    let expected = to_string_with(&batch, &config).unwrap();
    let mut writer = tokio_test::io::Builder::new()
        .write(expected.as_bytes())
        .build();
    write_batch(&mut writer, &batch, &config).await.unwrap();
}

#[tokio::test]
async fn submit_batch_skips_taken_ids_test() {
    let batch = crate::parser::parse_batch_request(
        r#"<batchRequest><delRequest dn="cn=a"/><abandonRequest requestID="1" abandonID="5"/></batchRequest>"#,
    )
    .unwrap();
    let mut writer = tokio_test::io::Builder::new()
        .write(&hex::decode("30090201024a04636e3d61").unwrap())
        .write(&hex::decode("3006020101500105").unwrap())
        .build();
    assert_eq!(submit_batch(&mut writer, &batch).await.unwrap(), 2);
}
