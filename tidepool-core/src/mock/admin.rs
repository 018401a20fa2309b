use super::*;

pub struct MockAdmin {
    cluster: Arc<MockCluster>,
}

impl MockAdmin {
    pub fn new(cluster: Arc<MockCluster>) -> Self {
        Self { cluster }
    }
}

impl AdminClient for MockAdmin {
    fn partitions_for(
        &self,
        topic: &str,
        _timeout: Duration,
    ) -> Result<Option<Vec<PartitionMetadata>>> {
        Ok(self.cluster.partition_count(topic)?.map(|count| {
            (0..count)
                .map(|partition| PartitionMetadata {
                    topic: topic.to_string(),
                    partition,
                })
                .collect()
        }))
    }
}
