use anyerror::AnyError;
use zenoh::bytes::ZBytes;

pub trait MsgSerde: Send + Sync + 'static {
    type Data: Send + Sync + 'static;

    fn to_zbyte(payload: &Self::Data) -> Result<ZBytes, AnyError>;

    fn from_zbyte(payload: &ZBytes) -> Result<Self::Data, AnyError>;
}

#[cfg(feature = "bincode")]
pub use bincode_serde::BincodeMsgSerde;

#[cfg(feature = "bincode")]
mod bincode_serde {
    use std::marker::PhantomData;

    use anyerror::AnyError;
    use bincode::config::{self, Configuration};
    use zenoh::bytes::ZBytes;

    use super::MsgSerde;

    const BINCODE_CONFIG: Configuration = config::standard();

    #[derive(Clone)]
    pub struct BincodeMsgSerde<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        _data: PhantomData<T>,
    }

    impl<T> MsgSerde for BincodeMsgSerde<T>
    where
        T: serde::Serialize
            + serde::de::DeserializeOwned
            + Send
            + Sync
            + 'static,
    {
        type Data = T;

        fn to_zbyte(payload: &Self::Data) -> Result<ZBytes, AnyError> {
            let payload = bincode::serde::encode_to_vec(payload, BINCODE_CONFIG)
                .map_err(|e| AnyError::new(&e))?;
            Ok(ZBytes::from(payload))
        }

        fn from_zbyte(payload: &ZBytes) -> Result<Self::Data, AnyError> {
            bincode::serde::decode_from_slice(&payload.to_bytes(), BINCODE_CONFIG)
                .map(|(data, _)| data)
                .map_err(|e| AnyError::new(&e))
        }
    }

}
