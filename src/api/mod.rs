mod buckets;
mod listing;
mod objects;

pub use buckets::{
    BucketStatusRequest, BucketsService, CreateBucketRequest, DeleteBucketRequest,
    GetBucketLocationRequest, GetBucketVersioningRequest, GetRequestPaymentRequest,
    ListBucketsRequest, PutBucketVersioningRequest, PutRequestPaymentRequest,
};
pub use listing::ListPager;
pub use objects::{
    CopyObjectRequest, DeleteObjectRequest, GetObjectRequest, HeadObjectRequest,
    ListObjectsRequest, ListRequest, ListVersionsRequest, ObjectsService,
    PartitionedListRequest, PresignObjectRequest, PutObjectRequest,
};
