//! Response compression stage.

use tower_http::compression::{
    CompressionLayer,
    predicate::{And, NotForContentType, Predicate, SizeAbove},
};

/// Compress bodies of at least `min_bytes`, skipping gRPC, images and event streams.
pub type CompressionPredicate =
    And<And<And<SizeAbove, NotForContentType>, NotForContentType>, NotForContentType>;

/// gzip, brotli or deflate, negotiated from `Accept-Encoding`.
pub fn layer(min_bytes: u16) -> CompressionLayer<CompressionPredicate> {
    let predicate = SizeAbove::new(min_bytes)
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE);

    CompressionLayer::new().compress_when(predicate)
}
